use chrono::{Datelike, NaiveDate};

use evo_digest_common::layout::{
    commit_message, date_from_file_name, digest_file_name, digest_relative_path,
    parse_digest_date, DIGEST_DIR, DIGEST_GIT_PATHSPEC, DIGEST_PATHSPEC,
};

fn load_contract() -> serde_json::Value {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../contracts/digest-layout.json");
    let content = std::fs::read_to_string(path).expect("contract file should be readable");
    serde_json::from_str(&content).expect("contract file should be valid JSON")
}

fn load_workflow() -> String {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../.github/workflows/evo-digest.yml");
    std::fs::read_to_string(path).expect("workflow file should be readable")
}

fn contract_str<'a>(contract: &'a serde_json::Value, pointer: &str) -> &'a str {
    contract
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("contract should contain string at {pointer}"))
}

#[test]
fn layout_constants_match_contract() {
    let contract = load_contract();
    assert_eq!(DIGEST_DIR, contract_str(&contract, "/digest_dir"));
    assert_eq!(DIGEST_PATHSPEC, contract_str(&contract, "/pathspec"));
    assert_eq!(
        DIGEST_GIT_PATHSPEC.strip_prefix(":(glob)"),
        Some(contract_str(&contract, "/pathspec"))
    );
}

#[test]
fn example_date_matches_contract() {
    let contract = load_contract();
    let date = parse_digest_date(contract_str(&contract, "/file_name_example/date"))
        .expect("contract date should parse");

    assert_eq!(digest_file_name(date), contract_str(&contract, "/file_name_example/file_name"));
    assert_eq!(
        digest_relative_path(date),
        contract_str(&contract, "/file_name_example/relative_path")
    );
    assert_eq!(
        commit_message(date),
        contract_str(&contract, "/file_name_example/commit_message")
    );
}

#[test]
fn commit_message_uses_contract_prefix_for_any_date() {
    let contract = load_contract();
    let prefix = contract_str(&contract, "/commit_message_prefix");
    let date = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
    assert_eq!(commit_message(date), format!("{prefix}2025-12-31"));
}

#[test]
fn every_day_of_a_leap_year_roundtrips_through_its_file_name() {
    let mut date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    while date.year() == 2024 {
        assert_eq!(date_from_file_name(&digest_file_name(date)), Some(date));
        date = date.succ_opt().unwrap();
    }
}

#[test]
fn workflow_stages_and_commits_per_contract() {
    let contract = load_contract();
    let workflow = load_workflow();

    assert!(
        workflow.contains(&format!("file_pattern: {}", contract_str(&contract, "/pathspec"))),
        "workflow commit step must stage only the digest pathspec"
    );
    assert!(
        workflow.contains(&format!(
            "commit_message: {}",
            contract_str(&contract, "/commit_message_prefix")
        )),
        "workflow commit message must use the contract prefix"
    );
}

#[test]
fn workflow_runs_after_the_tokyo_close() {
    let contract = load_contract();
    let workflow = load_workflow();
    let cron = contract_str(&contract, "/schedule_cron");

    assert!(workflow.contains(&format!("cron: \"{cron}\"")), "workflow must use the contract cron");

    let mut fields = cron.split_whitespace();
    let minute: u32 = fields.next().unwrap().parse().unwrap();
    let hour_utc: u32 = fields.next().unwrap().parse().unwrap();
    let jst_minutes = ((hour_utc + 9) % 24) * 60 + minute;
    assert!(jst_minutes >= 18 * 60 + 5, "run must start after the 18:05 JST exercise filings");
}

#[test]
fn workflow_gates_save_and_commit_on_summary_output() {
    let contract = load_contract();
    let workflow = load_workflow();
    let gate = format!("if: steps.digest.outputs.{} != ''", contract_str(&contract, "/step_output"));

    assert_eq!(workflow.matches(&gate).count(), 2, "save and commit steps must both be gated");
    assert!(workflow.contains(&format!(
        "{}: ${{{{ secrets.{} }}}}",
        contract_str(&contract, "/webhook_env"),
        contract_str(&contract, "/webhook_env")
    )));
}
