//! End-to-end deploys against real git remotes.

mod support;

use deployer_core::config::parse_config_str;
use deployer_core::deploy::{DeployRequest, DeployStatus, OverrideFlags};
use deployer_core::release::{ReleaseInfo, ReleaseState};
use deployer_core::types::ProviderKind;

use support::{Fixture, RELOAD_SCRIPT, SETUP_SCRIPT, StubReleases, head_commit};

fn manual(branch: &str) -> DeployRequest {
    DeployRequest::manual("TestRepo", branch).with_host("deploy.example.com")
}

#[tokio::test]
async fn first_deploy_clones_and_runs_setup() {
    let fixture = Fixture::new();
    let mut remote = fixture.remote("TestRepo");
    remote.script("master", "setup", SETUP_SCRIPT);
    let head = remote.script("master", "reload", RELOAD_SCRIPT);

    let config = fixture.config("");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::NoRelease));

    let outcome = deployer
        .deploy(&config, &settings, &manual("master"), &mut ReleaseState::new())
        .await;

    assert_eq!(outcome.status, DeployStatus::Success, "{}", outcome.body);
    assert!(outcome.body.contains("[+] Setup Script:\n    setup master deploy.example.com"));
    assert!(outcome.body.ends_with("\n\nOverall success!"));
    assert_eq!(head_commit(&fixture.path("TestRepo")), head);
}

#[tokio::test]
async fn later_deploy_resets_and_runs_reload() {
    let fixture = Fixture::new();
    let mut remote = fixture.remote("TestRepo");
    remote.script("master", "reload", RELOAD_SCRIPT);

    let config = fixture.config("");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::NoRelease));

    let first = deployer
        .deploy(&config, &settings, &manual("master"), &mut ReleaseState::new())
        .await;
    assert!(first.body.contains("[!] No setup script found"));

    let newer = remote.commit("master", &[("app.txt", "v2\n")], "update app");
    let second = deployer
        .deploy(&config, &settings, &manual("master"), &mut ReleaseState::new())
        .await;

    assert_eq!(second.status, DeployStatus::Success, "{}", second.body);
    assert!(second.body.contains("[+] Reload script:\n    reload master deploy.example.com"));
    assert_eq!(head_commit(&fixture.path("TestRepo")), newer);
}

#[tokio::test]
async fn repeated_deploy_is_idempotent() {
    let fixture = Fixture::new();
    let _remote = fixture.remote("TestRepo");
    let config = fixture.config("");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::NoRelease));

    let first = deployer
        .deploy(&config, &settings, &manual("master"), &mut ReleaseState::new())
        .await;
    let head = head_commit(&fixture.path("TestRepo"));
    let second = deployer
        .deploy(&config, &settings, &manual("master"), &mut ReleaseState::new())
        .await;

    assert_eq!(first.status, DeployStatus::Success);
    assert_eq!(second.status, DeployStatus::Success);
    assert_eq!(head_commit(&fixture.path("TestRepo")), head);
}

#[tokio::test]
async fn whitelist_rejects_without_touching_disk() {
    let fixture = Fixture::new();
    let _remote = fixture.remote("TestRepo");
    let config = fixture.config("[repos.TestRepo]\nwhitelisted_branches = ['master']\n");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::NoRelease));

    let outcome = deployer
        .deploy(&config, &settings, &manual("noWhitelist"), &mut ReleaseState::new())
        .await;

    assert_eq!(outcome.status, DeployStatus::PolicyRejected);
    assert_eq!(outcome.status_code(), 200);
    assert_eq!(
        outcome.body,
        "Auto deployment for branch ('noWhitelist') in config disabled, add query param 'force=1' to deploy anyway."
    );
    assert!(!fixture.path("TestRepo-noWhitelist").exists());
}

#[tokio::test]
async fn force_overrides_whitelist() {
    let fixture = Fixture::new();
    let mut remote = fixture.remote("TestRepo");
    let head = remote.commit("master", &[("app.txt", "v1\n")], "app");
    remote.branch("noWhitelist", head);

    let config = fixture.config("[repos.TestRepo]\nwhitelisted_branches = ['master']\n");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::NoRelease));

    let request = manual("noWhitelist").with_flags(OverrideFlags {
        force: true,
        ..Default::default()
    });
    let outcome = deployer
        .deploy(&config, &settings, &request, &mut ReleaseState::new())
        .await;

    assert_eq!(outcome.status, DeployStatus::Success, "{}", outcome.body);
    assert!(outcome.body.contains(
        "[!] Auto deployment for branch ('noWhitelist') in config disabled, ignoring this and deploy anyway..."
    ));
    assert_eq!(head_commit(&fixture.path("TestRepo-noWhitelist")), head);
}

#[tokio::test]
async fn disabled_marker_file_stops_unforced_deploy() {
    let fixture = Fixture::new();
    let _remote = fixture.remote("TestRepo");
    let config = fixture.config("");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::NoRelease));

    deployer
        .deploy(&config, &settings, &manual("master"), &mut ReleaseState::new())
        .await;
    std::fs::write(fixture.path("TestRepo").join("disabled-master"), "").unwrap();

    let outcome = deployer
        .deploy(&config, &settings, &manual("master"), &mut ReleaseState::new())
        .await;
    assert_eq!(outcome.status, DeployStatus::PolicyRejected);
    assert!(outcome.body.contains("per file disabled"));
}

#[tokio::test]
async fn release_only_branch_requires_a_tag() {
    let fixture = Fixture::new();
    let _remote = fixture.remote("TestRepo");
    let config = fixture.config("[repos.TestRepo]\nreleases_only = { '.Releases' = true }\n");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::Published("v1".into())));

    let outcome = deployer
        .deploy(&config, &settings, &manual(".Releases"), &mut ReleaseState::new())
        .await;

    assert_eq!(outcome.status, DeployStatus::BadRequest);
    assert!(outcome.body.starts_with("This branch '.Releases' has releaseOnly mode enabled."));
    assert!(outcome.body.contains("'ignoreRelease=1'"));
    assert!(!fixture.path("TestRepo-.Releases").exists());
}

#[tokio::test]
async fn unknown_release_needs_ignore_release() {
    let fixture = Fixture::new();
    let mut remote = fixture.remote("TestRepo");
    let v1 = remote.commit("master", &[("app.txt", "v1\n")], "v1");
    remote.tag("v1", v1);
    remote.commit("master", &[("app.txt", "v2\n")], "v2");

    let config = fixture.config("[repos.TestRepo]\nreleases_only = { '.Releases' = true }\n");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::NoRelease));

    let request = manual(".Releases").with_tag(Some("v1".into()));
    let rejected = deployer
        .deploy(&config, &settings, &request, &mut ReleaseState::new())
        .await;
    assert_eq!(rejected.status, DeployStatus::BadRequest);
    assert!(rejected.body.contains("no published release available yet"));

    let request = request.with_flags(OverrideFlags {
        ignore_release: true,
        ..Default::default()
    });
    let outcome = deployer
        .deploy(&config, &settings, &request, &mut ReleaseState::new())
        .await;

    assert_eq!(outcome.status, DeployStatus::Success, "{}", outcome.body);
    assert!(outcome.body.starts_with("ATTENTION!\nThis branch '.Releases' has releaseOnly mode enabled."));
    assert_eq!(head_commit(&fixture.path("TestRepo-.Releases")), v1);
}

#[tokio::test]
async fn older_tag_is_moved_to_newest() {
    let fixture = Fixture::new();
    let mut remote = fixture.remote("TestRepo");
    let dev18 = remote.commit("master", &[("app.txt", "18\n")], "dev18");
    remote.tag("dev18", dev18);
    let dev22 = remote.commit("master", &[("app.txt", "22\n")], "dev22");
    remote.tag("dev22", dev22);

    let config = fixture.config("");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::NoRelease));

    let request = manual("master").with_tag(Some("dev18".into()));
    let outcome = deployer
        .deploy(&config, &settings, &request, &mut ReleaseState::new())
        .await;

    assert_eq!(outcome.status, DeployStatus::Success, "{}", outcome.body);
    assert!(outcome.body.starts_with(
        "ATTENTION!\nSpecified tag ('dev18') is not the newest on this branch. Will set tag to the newest one ('dev22')."
    ));
    assert!(outcome.body.contains("  dev22\n  dev18 <= specified tag"));
    assert!(outcome.body.contains("[!] Set tag to 'dev22' (look at the attention section above)"));
    assert_eq!(head_commit(&fixture.path("TestRepo")), dev22);

    let request = request.with_flags(OverrideFlags {
        ignore_tag_date: true,
        ..Default::default()
    });
    let outcome = deployer
        .deploy(&config, &settings, &request, &mut ReleaseState::new())
        .await;
    assert_eq!(outcome.status, DeployStatus::Success, "{}", outcome.body);
    assert!(!outcome.body.contains("ATTENTION!"));
    assert_eq!(head_commit(&fixture.path("TestRepo")), dev18);
}

#[tokio::test]
async fn latest_tag_sentinel_checks_out_newest() {
    let fixture = Fixture::new();
    let mut remote = fixture.remote("TestRepo");
    let first = remote.commit("master", &[("app.txt", "1\n")], "one");
    remote.tag("v1", first);
    let second = remote.commit("master", &[("app.txt", "2\n")], "two");
    remote.tag("v2", second);
    remote.commit("master", &[("app.txt", "3\n")], "untagged");

    let config = fixture.config("");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::NoRelease));

    let request = manual("master").with_tag(Some("latest".into()));
    let outcome = deployer
        .deploy(&config, &settings, &request, &mut ReleaseState::new())
        .await;

    assert_eq!(outcome.status, DeployStatus::Success, "{}", outcome.body);
    assert!(outcome.body.contains("[+] Switch to latest tag ('v2') on ('master')"));
    assert_eq!(head_commit(&fixture.path("TestRepo")), second);
}

#[tokio::test]
async fn latest_release_sentinel_on_plain_branch() {
    let fixture = Fixture::new();
    let mut remote = fixture.remote("TestRepo");
    let v1 = remote.commit("master", &[("app.txt", "1\n")], "one");
    remote.tag("v1", v1);
    let v2 = remote.commit("master", &[("app.txt", "2\n")], "two");
    remote.tag("v2", v2);

    let config = fixture.config("");
    let settings = Fixture::settings(&config);
    let releases = StubReleases::new(ReleaseInfo::Published("v1".into()));
    let deployer = Fixture::deployer(releases.clone());

    let request = manual("master").with_tag(Some("latestRelease".into()));
    let outcome = deployer
        .deploy(&config, &settings, &request, &mut ReleaseState::new())
        .await;

    assert_eq!(outcome.status, DeployStatus::Success, "{}", outcome.body);
    assert_eq!(releases.calls(), 1);
    assert!(outcome.body.contains("[+] Switch to latest release ('v1') on ('master')"));
    assert!(!outcome.body.contains("ATTENTION"));
    assert_eq!(head_commit(&fixture.path("TestRepo")), v1);
}

#[tokio::test]
async fn latest_release_sentinel_without_release_api() {
    let fixture = Fixture::new();
    let mut remote = fixture.remote("TestRepo");
    let v1 = remote.commit("master", &[("app.txt", "1\n")], "one");
    remote.tag("v1", v1);
    let head = remote.commit("master", &[("app.txt", "2\n")], "two");

    let config = parse_config_str(&format!(
        "[providers.gitlab]\nbase_url = '{}/'\ndeploy_path = '{}'\n",
        fixture.remotes.display(),
        fixture.deploy_root.display()
    ))
    .unwrap();
    let settings = config.provider(ProviderKind::GitLab).unwrap();
    let releases = StubReleases::new(ReleaseInfo::Published("v1".into()));
    let deployer = Fixture::deployer(releases.clone());

    let request = manual("master").with_tag(Some("latestRelease".into()));
    let outcome = deployer
        .deploy(&config, &settings, &request, &mut ReleaseState::new())
        .await;

    assert_eq!(outcome.status, DeployStatus::BadRequest);
    assert!(outcome.body.contains("But there is no published release available yet."));
    assert_eq!(releases.calls(), 0);
    assert!(!fixture.path("TestRepo").exists());

    let request = request.with_flags(OverrideFlags {
        ignore_release: true,
        ..Default::default()
    });
    let outcome = deployer
        .deploy(&config, &settings, &request, &mut ReleaseState::new())
        .await;

    assert_eq!(outcome.status, DeployStatus::Success, "{}", outcome.body);
    assert!(outcome.body.contains("No release available, switch to latest push."));
    assert_eq!(releases.calls(), 0);
    assert_eq!(head_commit(&fixture.path("TestRepo")), head);
}

#[tokio::test]
async fn unsafe_repo_name_is_rejected() {
    let fixture = Fixture::new();
    let config = fixture.config("");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::NoRelease));

    let request = DeployRequest::manual("../escape", "master");
    let outcome = deployer
        .deploy(&config, &settings, &request, &mut ReleaseState::new())
        .await;

    assert_eq!(outcome.status, DeployStatus::BadRequest);
    assert!(!fixture.deploy_root.parent().unwrap().join("escape").exists());
}

#[tokio::test]
async fn missing_remote_branch_is_a_git_failure() {
    let fixture = Fixture::new();
    let _remote = fixture.remote("TestRepo");
    let config = fixture.config("");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::NoRelease));

    let outcome = deployer
        .deploy(&config, &settings, &manual("gone"), &mut ReleaseState::new())
        .await;

    assert_eq!(outcome.status, DeployStatus::GitFailure);
    assert_eq!(outcome.status_code(), 500);
    assert!(outcome.body.starts_with("AUTOMATIC DEPLOY FAILED!\n"));
    assert!(outcome.body.contains("(CRASHED)"));
    assert!(outcome.body.contains("[!] Skip reload or setup script (deploying failed)"));
    assert!(!fixture.path("TestRepo-gone").exists());
}

#[tokio::test]
async fn failing_setup_script_fails_the_deploy() {
    let fixture = Fixture::new();
    let mut remote = fixture.remote("TestRepo");
    remote.script("master", "setup", "#!/bin/sh\necho broken\nexit 1\n");

    let config = fixture.config("");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::NoRelease));

    let outcome = deployer
        .deploy(&config, &settings, &manual("master"), &mut ReleaseState::new())
        .await;

    assert_eq!(outcome.status, DeployStatus::ScriptFailure);
    assert!(outcome.body.contains("[-] Setup Script (CRASHED):\n    broken"));
}

#[tokio::test]
async fn concurrent_deploys_of_one_target_run_one_after_another() {
    const SLOW_RELOAD: &str = "#!/bin/sh\necho \"start $2\" >> ../reload.log\nsleep 1\necho \"end $2\" >> ../reload.log\n";

    let fixture = Fixture::new();
    let mut remote = fixture.remote("TestRepo");
    remote.script("master", "reload", SLOW_RELOAD);

    let config = fixture.config("");
    let settings = Fixture::settings(&config);
    let deployer = Fixture::deployer(StubReleases::new(ReleaseInfo::NoRelease));

    let first = deployer
        .deploy(&config, &settings, &manual("master"), &mut ReleaseState::new())
        .await;
    assert_eq!(first.status, DeployStatus::Success, "{}", first.body);

    let one = DeployRequest::manual("TestRepo", "master").with_host("one");
    let two = DeployRequest::manual("TestRepo", "master").with_host("two");
    let mut release_one = ReleaseState::new();
    let mut release_two = ReleaseState::new();
    let (a, b) = tokio::join!(
        deployer.deploy(&config, &settings, &one, &mut release_one),
        deployer.deploy(&config, &settings, &two, &mut release_two),
    );
    assert_eq!(a.status, DeployStatus::Success, "{}", a.body);
    assert_eq!(b.status, DeployStatus::Success, "{}", b.body);

    let log = std::fs::read_to_string(fixture.deploy_root.join("reload.log")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 4, "{}", log);
    for pair in lines.chunks(2) {
        let host = pair[0].strip_prefix("start ").unwrap();
        assert_eq!(pair[1], format!("end {}", host), "{}", log);
    }
}
