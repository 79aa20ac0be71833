use std::fs;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};
use tempfile::TempDir;

const REPORT: &str = "user,arn,user_creation_time,password_enabled,password_last_used,password_last_changed,password_next_rotation,mfa_active
<root_account>,arn:aws:iam::123456789012:root,2019-01-01T00:00:00+00:00,not_supported,2024-01-01T00:00:00+00:00,not_supported,not_supported,true
alice,arn:aws:iam::123456789012:user/alice,2019-01-01T00:00:00+00:00,true,N/A,2001-01-01T00:00:00+00:00,N/A,true
svc-deploy,arn:aws:iam::123456789012:user/svc-deploy,2019-01-01T00:00:00+00:00,false,N/A,N/A,N/A,false
broken,row
";

fn write_report(dir: &TempDir) -> String {
    let path = dir.path().join("report.csv");
    fs::write(&path, REPORT).unwrap();
    path.to_str().unwrap().to_string()
}

mod test {
    use super::*;

    #[test]
    fn cli_version_flag() {
        Command::cargo_bin("iamwatch")
            .unwrap()
            .arg("--version")
            .assert()
            .success()
            .stdout(contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn report_from_file_pretty() {
        let tmp = TempDir::new().unwrap();
        let input = write_report(&tmp);
        Command::cargo_bin("iamwatch")
            .unwrap()
            .args(["report", "--input", &input, "--quiet"])
            .assert()
            .success()
            .stdout(
                contains("alice")
                    .and(contains("expiring"))
                    .and(contains("unsupported"))
                    .and(contains("not-applicable"))
                    .and(contains("1 of 3 accounts have passwords older than 78 days"))
                    .and(contains("skipped line 5")),
            );
    }

    #[test]
    fn report_from_file_json() {
        let tmp = TempDir::new().unwrap();
        let input = write_report(&tmp);
        let out = Command::cargo_bin("iamwatch")
            .unwrap()
            .args(["report", "--input", &input, "--format", "json", "--max-age-days", "60"])
            .output()
            .unwrap();
        assert!(out.status.success());

        let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
        assert_eq!(v["threshold_days"], 48);
        assert_eq!(v["entries"].as_array().unwrap().len(), 3);
        assert_eq!(v["entries"][1]["account_id"], "alice");
        assert_eq!(v["entries"][1]["status"], "expiring");
        assert_eq!(v["warnings"][0]["line"], 5);
    }

    #[test]
    fn report_writes_output_file() {
        let tmp = TempDir::new().unwrap();
        let input = write_report(&tmp);
        let out_path = tmp.path().join("ages.json");
        Command::cargo_bin("iamwatch")
            .unwrap()
            .args(["report", "--input", &input, "--format", "json", "--output"])
            .arg(&out_path)
            .assert()
            .success();
        let written = fs::read_to_string(&out_path).unwrap();
        assert!(written.contains("\"svc-deploy\""));
    }

    #[test]
    fn report_fails_for_missing_input() {
        Command::cargo_bin("iamwatch")
            .unwrap()
            .args(["report", "--input", "no/such/report.csv"])
            .assert()
            .failure()
            .stderr(contains("Failed to read credential report"));
    }

    #[test]
    fn invalid_policy_is_rejected_before_contacting_aws() {
        Command::cargo_bin("iamwatch")
            .unwrap()
            .args(["notify", "--max-age-days", "30", "--warning-days", "45"])
            .assert()
            .failure()
            .stderr(contains("warning window (45 days) must be shorter"));
    }

    #[test]
    fn oversized_poll_interval_is_rejected() {
        Command::cargo_bin("iamwatch")
            .unwrap()
            .args(["notify", "--dry-run", "--poll-interval", "1e20"])
            .assert()
            .failure()
            .stderr(contains("poll interval of"));
    }

    #[test]
    fn bad_config_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let cfg = tmp.path().join("iamwatch.yml");
        fs::write(&cfg, "policy: [not, a, map]\n").unwrap();
        Command::cargo_bin("iamwatch")
            .unwrap()
            .args(["notify", "--dry-run", "--config"])
            .arg(&cfg)
            .assert()
            .failure()
            .stderr(contains("failed to parse config file"));
    }

    #[test]
    fn dry_run_conflicts_with_console() {
        Command::cargo_bin("iamwatch")
            .unwrap()
            .args(["notify", "--dry-run", "--console"])
            .assert()
            .failure()
            .stderr(contains("cannot be used with"));
    }
}
