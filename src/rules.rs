/*!
 * Business rule inspection
 *
 * A rule counts as customized when whoever last updated it is not whoever
 * created it. This is a very rough signal: it says nothing about what
 * changed, only that a second person touched the rule.
 */

use serde_json::Value;
use tracing::info;

use crate::client::TableApi;
use crate::error::Result;
use crate::payload::{field_text, RemotePayload};

/// Table holding server-side business rule scripts
pub const BUSINESS_RULE_TABLE: &str = "sys_script";

/// Filter selecting the rules attached to `application`
pub fn business_rule_query(application: &str) -> String {
    format!("sysparm_query=collection={}", application)
}

/// Fetch every business rule attached to the application table
pub fn fetch_business_rules(api: &impl TableApi, application: &str) -> Result<RemotePayload> {
    api.fetch(BUSINESS_RULE_TABLE, &business_rule_query(application))
}

/// Rules whose creator differs from their last editor, in response order.
///
/// A rule missing either field is not flagged.
pub fn identify_customized(rules: &RemotePayload) -> Vec<&Value> {
    let customized: Vec<&Value> = rules
        .records()
        .iter()
        .filter(|rule| {
            match (
                field_text(rule, "sys_created_by"),
                field_text(rule, "sys_updated_by"),
            ) {
                (Some(created), Some(updated)) => created != updated,
                _ => false,
            }
        })
        .collect();

    for (n, rule) in customized.iter().enumerate() {
        info!(
            "{}. {}",
            n + 1,
            field_text(rule, "sys_name").unwrap_or_default()
        );
    }
    customized
}
