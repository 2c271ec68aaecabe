//! The `bcf.extensions` vocabulary file.

use crate::Result;
use crate::config::BcfConfig;
use crate::models::TopicField;
use crate::xml::{Element, escape};
use std::collections::BTreeSet;

/// Group tag and item tag for each vocabulary field, in document order.
const GROUPS: [(TopicField, &str, &str); 6] = [
    (TopicField::Type, "TopicTypes", "TopicType"),
    (TopicField::Status, "TopicStatuses", "TopicStatus"),
    (TopicField::Priority, "Priorities", "Priority"),
    (TopicField::Label, "TopicLabels", "TopicLabel"),
    (TopicField::Stage, "Stages", "Stage"),
    (TopicField::AssignedTo, "Users", "User"),
];

/// Serialize the vocabulary. Empty groups are left out.
pub fn serialize(config: &BcfConfig) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(
        "<Extensions xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xsi:noNamespaceSchemaLocation=\"extensions.xsd\">",
    );
    for (field, group, item) in GROUPS {
        out.push_str(&group_xml(group, item, config.vocabulary(field)));
    }
    out.push_str("</Extensions>");
    out
}

fn group_xml(group: &str, item: &str, values: &BTreeSet<String>) -> String {
    let items: String = values
        .iter()
        .filter(|v| !v.is_empty())
        .map(|v| format!("<{item}>{}</{item}>", escape(v)))
        .collect();
    if items.is_empty() {
        return String::new();
    }
    format!("<{group}>{items}</{group}>")
}

/// Add every value listed in an extensions document to the vocabulary.
///
/// Returns the number of values that were new.
pub fn merge(xml: &str, config: &mut BcfConfig) -> Result<usize> {
    let root = Element::parse(xml)?;
    let mut added = 0;
    for (field, group, item) in GROUPS {
        let values: Vec<String> = root
            .children_named(group)
            .flat_map(|g| g.children_named(item))
            .map(|e| e.text.clone())
            .filter(|v| !v.is_empty())
            .collect();
        let before = config.vocabulary(field).len();
        config.extend_vocabulary(field, values);
        added += config.vocabulary(field).len() - before;
    }
    tracing::debug!(added, "Merged extensions into vocabulary");
    Ok(added)
}
