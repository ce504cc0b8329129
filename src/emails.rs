//! User email backfill
//!
//! Slack exports ship a `users.json` whose profiles have the email field
//! stripped. This module fetches the workspace member list from the
//! `users.list` API through the same authenticated transport used for
//! attachments and merges each member's email back into their profile.
//!
//! The rewrite happens in place against the export tree, atomically
//! (write-to-temp-then-rename), so a subsequent [`crate::assemble`] call
//! picks up the enriched `users.json` with no extra wiring. All fields
//! the export carries are preserved; only `profile.email` is touched.

use crate::error::{Error, Result};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Slack API endpoint listing all workspace members
pub const USERS_LIST_URL: &str = "https://slack.com/api/users.list";

/// One member of the users.list response, trimmed to the fields needed
#[derive(Debug, Deserialize)]
struct Member {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    profile: Option<MemberProfile>,
}

#[derive(Debug, Deserialize)]
struct MemberProfile {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserListResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    members: Vec<Member>,
}

/// Backfill member emails into `<export_root>/users.json`
///
/// Fetches the member list from [`USERS_LIST_URL`] and rewrites the
/// export's `users.json` in place. Returns the number of profiles that
/// received an email. Entries without an `id` or a `profile` object are
/// logged and left untouched; a member the API reports no email for
/// keeps whatever the export already had.
pub async fn backfill_emails(export_root: &Path, transport: &dyn Transport) -> Result<usize> {
    backfill_emails_from(export_root, transport, USERS_LIST_URL).await
}

/// Like [`backfill_emails`], with an explicit users.list endpoint
pub async fn backfill_emails_from(
    export_root: &Path,
    transport: &dyn Transport,
    users_list_url: &str,
) -> Result<usize> {
    let users_path = export_root.join("users.json");
    info!(path = ?users_path, "backfilling user emails");

    let content = std::fs::read(&users_path)?;
    // Untyped maps so every field the export carries survives the rewrite,
    // including ones added to the schema after this was written.
    let mut users: Vec<serde_json::Map<String, Value>> = serde_json::from_slice(&content)
        .map_err(|e| Error::Parse {
            path: users_path.clone(),
            reason: e.to_string(),
        })?;
    if users.is_empty() {
        return Err(Error::Parse {
            path: users_path,
            reason: "no user entries found".to_string(),
        });
    }

    let emails = fetch_user_emails(transport, users_list_url).await?;

    let mut updated = 0usize;
    for user in &mut users {
        let Some(id) = user.get("id").and_then(Value::as_str).map(str::to_owned) else {
            warn!("user entry has no id, skipping");
            continue;
        };
        let Some(profile) = user.get_mut("profile").and_then(Value::as_object_mut) else {
            warn!(id = %id, "user entry has no profile object, skipping");
            continue;
        };
        if let Some(email) = emails.get(&id) {
            debug!(id = %id, "setting profile email");
            profile.insert("email".to_string(), Value::String(email.clone()));
            updated += 1;
        }
    }

    // Indent matches what the export format uses.
    let mut rendered = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut rendered, formatter);
    users
        .serialize(&mut serializer)
        .map_err(std::io::Error::other)?;
    rendered.push(b'\n');

    let temp_path = export_root.join(".users.json.part");
    std::fs::write(&temp_path, &rendered)?;
    if let Err(e) = std::fs::rename(&temp_path, &users_path) {
        // Best effort: don't leave the partial file behind.
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }

    info!(updated, total = users.len(), "user emails backfilled");
    Ok(updated)
}

/// Fetch the member list and index emails by user id
async fn fetch_user_emails(
    transport: &dyn Transport,
    url: &str,
) -> Result<HashMap<String, String>> {
    debug!(url, "fetching workspace member list");
    let body = transport.get(url).await?;

    let response: UserListResponse =
        serde_json::from_slice(&body).map_err(|e| Error::UserList {
            reason: e.to_string(),
        })?;
    if !response.ok {
        return Err(Error::UserList {
            reason: "response has ok=false, is the API token correct?".to_string(),
        });
    }

    let mut emails = HashMap::new();
    for member in response.members {
        if let (Some(id), Some(email)) = (member.id, member.profile.and_then(|p| p.email)) {
            emails.insert(id, email);
        }
    }
    debug!(members = emails.len(), "member emails indexed");
    Ok(emails)
}
