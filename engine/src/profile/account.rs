//! User-account resolution: creates a missing destination account when
//! requested and fills in its SID.

use crate::collaborators::ProcessRunner;
use crate::error::EngineError;
use crate::model::UserMapping;
use crate::throttle::CancellationToken;

/// Resolve `mapping.destination_sid`, creating the destination account
/// first if `create_if_missing` is set and it doesn't already exist.
pub fn resolve_account(
    process_runner: &dyn ProcessRunner,
    mapping: &mut UserMapping,
    cancellation: &CancellationToken,
) -> Result<(), EngineError> {
    if mapping.destination_sid.is_some() {
        return Ok(());
    }

    let lookup = process_runner.run(
        "wmic",
        &[
            "useraccount".to_string(),
            "where".to_string(),
            format!("name='{}'", mapping.destination_username),
            "get".to_string(),
            "sid".to_string(),
        ],
        cancellation,
    )?;

    let existing_sid = extract_sid(&lookup.stdout);

    if existing_sid.is_none() && mapping.create_if_missing {
        let password = mapping.new_account_password.clone().ok_or_else(|| EngineError::UserError {
            message: format!("cannot create account {}: no transient password supplied", mapping.destination_username),
        })?;
        let output = process_runner.run(
            "net",
            &["user".to_string(), mapping.destination_username.clone(), password, "/add".to_string()],
            cancellation,
        )?;
        if output.exit_code != 0 {
            return Err(EngineError::UserError {
                message: format!("failed to create account {}: {}", mapping.destination_username, output.stderr),
            });
        }
    } else if existing_sid.is_none() {
        return Err(EngineError::UserError {
            message: format!("destination account {} does not exist and create_if_missing is false", mapping.destination_username),
        });
    }

    let lookup_again = process_runner.run(
        "wmic",
        &[
            "useraccount".to_string(),
            "where".to_string(),
            format!("name='{}'", mapping.destination_username),
            "get".to_string(),
            "sid".to_string(),
        ],
        cancellation,
    )?;
    mapping.destination_sid = extract_sid(&lookup_again.stdout).or(existing_sid);
    Ok(())
}

fn extract_sid(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("S-1-5-"))
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccountType, UserProfile};
    use crate::testutil::FakeProcessRunner;
    use std::path::PathBuf;

    fn sample_mapping() -> UserMapping {
        UserMapping {
            source: UserProfile {
                username: "bill".into(),
                sid: "S-1-5-21-1".into(),
                profile_path: PathBuf::from("C:\\Users\\bill"),
                is_domain: false,
                account_type: AccountType::Local,
                known_folders: Default::default(),
                browser_profiles: vec![],
                email_data: vec![],
                estimated_size_bytes: 0,
            },
            destination_username: "william".into(),
            destination_profile_path: PathBuf::from("C:\\Users\\william"),
            destination_sid: None,
            create_if_missing: true,
            new_account_password: Some("Temp1234!".into()),
            allow_password_capture: false,
        }
    }

    #[test]
    fn extract_sid_finds_sid_line() {
        let stdout = "SID\nS-1-5-21-123-456-789-1001\n\n";
        assert_eq!(extract_sid(stdout), Some("S-1-5-21-123-456-789-1001".to_string()));
    }

    /// A runner that answers the first `wmic` lookup with no SID (account
    /// absent) and every later call, including the post-creation lookup,
    /// with a resolved SID — exercising the create-then-resolve path.
    struct AccountAppearsAfterCreation {
        calls: std::sync::Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ProcessRunner for AccountAppearsAfterCreation {
        fn run(&self, program: &str, args: &[String], _cancellation: &CancellationToken) -> Result<crate::collaborators::ProcessOutput, EngineError> {
            let mut calls = self.calls.lock().unwrap();
            let is_first_lookup = program == "wmic" && !calls.iter().any(|(p, _)| p == "net");
            calls.push((program.to_string(), args.to_vec()));
            if program == "wmic" && is_first_lookup {
                Ok(crate::collaborators::ProcessOutput { exit_code: 0, stdout: "SID\n\n".to_string(), stderr: String::new() })
            } else {
                Ok(crate::collaborators::ProcessOutput { exit_code: 0, stdout: "SID\nS-1-5-21-999-1001\n".to_string(), stderr: String::new() })
            }
        }
    }

    #[test]
    fn resolve_account_creates_missing_account_and_fills_sid() {
        let runner = AccountAppearsAfterCreation { calls: std::sync::Mutex::new(Vec::new()) };
        let mut mapping = sample_mapping();
        let token = CancellationToken::new();
        resolve_account(&runner, &mut mapping, &token).unwrap();
        assert_eq!(mapping.destination_sid, Some("S-1-5-21-999-1001".to_string()));

        let calls = runner.calls.lock().unwrap();
        assert!(calls.iter().any(|(program, args)| program == "net" && args.contains(&"/add".to_string())));
    }

    #[test]
    fn resolve_account_fails_when_missing_and_create_disabled() {
        let runner = FakeProcessRunner::succeeding("");
        let mut mapping = sample_mapping();
        mapping.create_if_missing = false;
        let token = CancellationToken::new();
        let result = resolve_account(&runner, &mut mapping, &token);
        assert!(result.is_err());
    }
}
