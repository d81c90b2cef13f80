use std::path::Path;

/// What the renderer's flag files ask us to do after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlagAction {
    /// Environment is wedged; run the refresh script, then retry.
    RetryRefresh,
    /// Content filter tripped; retry once without touching the environment.
    RetrySensitive,
    /// Something went sideways but output may still exist; accept it if so.
    ConditionalRetry,
}

const REFRESH_FLAGS: [&str; 2] = ["ImageOpenFail.txt", "NOHOTBAR.txt"];
const SENSITIVE_FLAG: &str = "SENSITIVE.txt";
const CONDITIONAL_FLAGS: [&str; 2] = ["issue.txt", "PromptViolation.txt"];

/// Inspects and consumes the well-known flag files dropped by the renderer.
/// Every flag is deleted regardless of which action wins so a stale flag
/// cannot poison the next run.
pub(crate) fn consume_flags(flags_dir: &Path) -> Option<FlagAction> {
    let mut refresh = false;
    let mut sensitive = false;
    let mut conditional = false;

    for name in REFRESH_FLAGS {
        refresh |= take_flag(flags_dir, name);
    }
    sensitive = take_flag(flags_dir, SENSITIVE_FLAG) || sensitive;
    for name in CONDITIONAL_FLAGS {
        conditional |= take_flag(flags_dir, name);
    }

    if refresh {
        Some(FlagAction::RetryRefresh)
    } else if sensitive {
        Some(FlagAction::RetrySensitive)
    } else if conditional {
        Some(FlagAction::ConditionalRetry)
    } else {
        None
    }
}

fn take_flag(flags_dir: &Path, name: &str) -> bool {
    let path = flags_dir.join(name);
    if path.exists() {
        let _ = std::fs::remove_file(&path);
        true
    } else {
        false
    }
}
