//! Response-to-response comparison.

use crate::model::Response;
use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use tracing::debug;


/// Compares `this` response with `other`, returning a description of the
/// first difference found. Status codes are compared first, then headers
/// (unless `ignore_headers`), then bodies.
pub fn diff(this: &Response, other: &Response, ignore_headers: bool) -> Option<String> {
    debug!("Comparing {} response with {}", this.status_code, other.status_code);
    if this.status_code != other.status_code {
        return Some(format!(
            "Status code mismatch. {} != {}",
            this.status_code, other.status_code
        ));
    }

    if !ignore_headers {
        let (this_headers, other_headers) = (header_lines(this), header_lines(other));
        if this_headers != other_headers {
            return Some(format!(
                "Response headers mismatch.\n{}",
                line_diff(&this_headers, &other_headers)
            ));
        }
    }

    body_diff(this, other)
}

/// Headers as sorted `name: value` lines, names lowercased so that order
/// and case do not matter.
fn header_lines(response: &Response) -> Vec<String> {
    let mut lines: Vec<String> = response
        .headers
        .iter()
        .map(|(name, value)| format!("{}: {}\n", name.to_lowercase(), value))
        .collect();
    lines.sort();
    lines
}

fn line_diff(this: &[String], other: &[String]) -> String {
    let this: Vec<&str> = this.iter().map(String::as_str).collect();
    let other: Vec<&str> = other.iter().map(String::as_str).collect();
    TextDiff::from_slices(&this, &other)
        .iter_all_changes()
        .map(|change| {
            let sign = match change.tag() {
                ChangeTag::Delete => "- ",
                ChangeTag::Insert => "+ ",
                ChangeTag::Equal => "  ",
            };
            format!("{}{}", sign, change.value())
        })
        .collect()
}

fn body_diff(this: &Response, other: &Response) -> Option<String> {
    let parsed = serde_json::from_slice::<Value>(&this.body)
        .and_then(|this| serde_json::from_slice::<Value>(&other.body).map(|other| (this, other)));
    match parsed {
        Ok((this, other)) if this != other => Some("Response body mismatch.".to_string()),
        Ok(_) => None,
        Err(e) if this.body != other.body => Some(format!(
            "Response body mismatch. Encountered error while comparing: {}",
            e
        )),
        Err(_) => None,
    }
}
