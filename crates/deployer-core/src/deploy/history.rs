//! Resolution of a requested tag against the tag history of the working copy.

use crate::transcript::Transcript;

use super::request::{LATEST_RELEASE, LATEST_TAG, OverrideFlags};

/// Inputs of [`resolve_tag`] besides the tag list.
#[derive(Debug, Clone, Copy)]
pub struct TagContext<'a> {
    pub branch_name: &'a str,
    pub webhook: bool,
    pub release_only: bool,
    pub flags: OverrideFlags,
    pub latest_release: Option<&'a str>,
}

/// Decide which tag to check out.
///
/// `tags` is sorted newest commit first. Returns `None` when the deploy
/// falls back to the branch head. Every redirect is explained in the
/// transcript.
pub fn resolve_tag(
    ctx: &TagContext<'_>,
    requested: &str,
    tags: &[String],
    transcript: &mut Transcript,
) -> Option<String> {
    let manual = !ctx.webhook;

    let tag = if manual && requested == LATEST_TAG {
        match tags.first() {
            Some(newest) => {
                transcript.note(format!(
                    "[+] Switch to latest tag ('{}') on ('{}')",
                    newest, ctx.branch_name
                ));
                newest.clone()
            }
            None => {
                fall_back_to_head(transcript, "No tag available, switch to latest push.");
                return None;
            }
        }
    } else if manual && requested == LATEST_RELEASE {
        match ctx.latest_release {
            Some(latest) if !tags.is_empty() => {
                transcript.note(format!(
                    "[+] Switch to latest release ('{}') on ('{}')",
                    latest, ctx.branch_name
                ));
                latest.to_string()
            }
            _ => {
                fall_back_to_head(transcript, "No release available, switch to latest push.");
                return None;
            }
        }
    } else {
        requested.to_string()
    };

    let Some(tag_rank) = tags.iter().position(|t| *t == tag) else {
        return Some(unknown_tag(ctx, tag, tags, transcript));
    };
    let newest = &tags[0];
    let is_latest_release = ctx.latest_release == Some(tag.as_str());
    let history = annotated_history(tags, tag_rank, ctx.latest_release);

    if (ctx.release_only && is_latest_release) || (!ctx.release_only && tag_rank == 0) {
        return Some(tag);
    }

    if !ctx.release_only {
        if ctx.webhook {
            transcript.attention(format!(
                "Specified tag ('{}') is not the newest on this branch. Setting tag to the newest one ('{}').\n\
                 {}\n\n\
                 Invocation per webhook only pulls latest tag version.",
                tag, newest, history
            ));
            return Some(redirect(transcript, newest));
        }
        if !ctx.flags.ignore_tag_date {
            transcript.attention(format!(
                "Specified tag ('{}') is not the newest on this branch. Will set tag to the newest one ('{}').\n\
                 If you want to checkout your tag anyway, add query param 'ignoreTagDate=1' to URL.\n\
                 {}\n\n\
                 If you want to silence this warning, specify the latest tag or set the tag name to 'latest'\n\
                 to always deploy the latest tag.",
                tag, newest, history
            ));
            return Some(redirect(transcript, newest));
        }
        transcript.note(format!(
            "[!] Specified tag ('{}') is not the newest on this branch.\n    Ignoring this and checking out '{}' anyway...",
            tag, tag
        ));
        return Some(tag);
    }

    match ctx.latest_release {
        Some(latest) if ctx.webhook => {
            transcript.attention(format!(
                "releaseOnly Mode is enabled for this branch ('{}').\n\
                 Specified release is not the newest release. Invocation per webhook only pulls latest release.\n\
                 {}\n\n\
                 Set deploying version to tag '{}'",
                ctx.branch_name, history, latest
            ));
            Some(redirect(transcript, latest))
        }
        Some(latest) if !ctx.flags.ignore_release => {
            transcript.attention(format!(
                "releaseOnly Mode is enabled for this branch ('{}').\n\
                 Specified tag is not the newest release. Setting tag to '{}'.\n\
                 {}\n\n\
                 To deploy the specified tag anyway, add query parameter 'ignoreRelease=1' to URL.",
                ctx.branch_name, latest, history
            ));
            Some(redirect(transcript, latest))
        }
        Some(latest) => {
            transcript.note(format!(
                "[!] Specified tag ('{}') is not the latest release ('{}').\n    Ignoring this and checking out '{}' anyway...",
                tag, latest, tag
            ));
            Some(tag)
        }
        None => {
            if manual && ctx.flags.ignore_release {
                transcript.attention(format!(
                    "This branch '{}' has releaseOnly mode enabled.\n\
                     {}\n\n\
                     Latest release version is unknown, ignoring this and deploying to tag '{}' anyway...",
                    ctx.branch_name, history, tag
                ));
            }
            Some(tag)
        }
    }
}

/// A tag missing from the history. Webhooks still move to the newest
/// authoritative version, manual deploys try the tag as given.
fn unknown_tag(
    ctx: &TagContext<'_>,
    tag: String,
    tags: &[String],
    transcript: &mut Transcript,
) -> String {
    if !ctx.webhook {
        return tag;
    }
    let authoritative = if ctx.release_only {
        ctx.latest_release
    } else {
        tags.first().map(String::as_str)
    };
    match authoritative {
        Some(target) if target != tag => {
            transcript.note(format!(
                "[!] Tag '{}' not found in the repository history, set tag to '{}'",
                tag, target
            ));
            target.to_string()
        }
        _ => tag,
    }
}

fn fall_back_to_head(transcript: &mut Transcript, reason: &str) {
    transcript.attention(reason);
    transcript.note("[!] Switch to latest push");
}

fn redirect(transcript: &mut Transcript, tag: &str) -> String {
    transcript.note(format!(
        "[!] Set tag to '{}' (look at the attention section above)",
        tag
    ));
    tag.to_string()
}

fn annotated_history(tags: &[String], tag_rank: usize, latest_release: Option<&str>) -> String {
    let lines: Vec<String> = tags
        .iter()
        .enumerate()
        .map(|(rank, tag)| {
            let mut line = format!("  {}", tag);
            if rank == tag_rank {
                line.push_str(" <= specified tag");
            }
            if latest_release == Some(tag.as_str()) {
                line.push_str(" <= latest published release");
            }
            line
        })
        .collect();
    format!(
        "History of tags (newest top, oldest bottom):\n{}",
        lines.join("\n")
    )
}
