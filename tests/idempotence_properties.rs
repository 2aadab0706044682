//! ---
//! sh_section: "15-testing-qa"
//! sh_subsection: "integration-tests"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Re-run safety of every provisioning step."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use std::fs;

use stackhost_common::{CommandOutcome, InstallerError};
use stackhost_config::{EnvFile, Upsert};
use stackhost_core::{
    InstallationState, Lifecycle, LifecycleCommand, LifecycleConfig, ScheduleOutcome,
    ScheduleRegistrar,
};
use stackhost_security::{KeyPairProvisioner, KeyProvision};
use stackhost_testharness::{FakeRunner, ProjectFixture, ScriptedPrompter};

const ENV_FILES: &[&str] = &[
    "",
    "BASE_URL=\n",
    "# header only\n",
    "A=1\n\n# comment\nB=two=2\nnot a setting\nC=3",
    "POSTGRES_PASSWORD=changeme\r\nREDIS_PASSWORD=changeme\r\n",
];

#[test]
fn upsert_of_new_key_appends_exactly_one_line() {
    for original in ENV_FILES {
        let mut env = EnvFile::parse(original);
        assert_eq!(env.upsert("SERVICE_KEY", "abc").unwrap(), Upsert::Inserted);
        let rendered = env.render();

        let before: Vec<&str> = original.lines().collect();
        let after: Vec<&str> = rendered.lines().collect();
        assert_eq!(after.len(), before.len() + 1, "{original:?}");
        assert_eq!(&after[..before.len()], &before[..], "{original:?}");
        assert_eq!(after.last(), Some(&"SERVICE_KEY=abc"));
    }
}

#[test]
fn upsert_of_existing_key_changes_only_its_line() {
    for original in ENV_FILES {
        let env = EnvFile::parse(original);
        let Some(key) = env.keys().next().map(str::to_owned) else {
            continue;
        };
        let mut updated = env.clone();
        assert_eq!(updated.upsert(&key, "replaced").unwrap(), Upsert::Updated);
        let rendered = updated.render();

        let before: Vec<&str> = original.lines().collect();
        let after: Vec<&str> = rendered.lines().collect();
        assert_eq!(before.len(), after.len(), "{original:?}");
        let changed: Vec<usize> = before
            .iter()
            .zip(&after)
            .enumerate()
            .filter(|(_, (old, new))| old != new)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(changed.len(), 1, "{original:?}");
        assert_eq!(after[changed[0]], format!("{key}=replaced"));

        let crlf_lines = |text: &str| text.matches("\r\n").count();
        assert_eq!(crlf_lines(&rendered), crlf_lines(original), "{original:?}");
    }
}

#[test]
fn key_provisioning_is_idempotent_and_all_or_nothing() {
    let fixture = ProjectFixture::new();
    let host = FakeRunner::debian();
    let keys = KeyPairProvisioner::for_project(&fixture.paths);

    assert_eq!(keys.ensure(&host).unwrap(), KeyProvision::Generated);
    let private = fs::read(keys.private_key()).unwrap();
    let public = fs::read(keys.public_key()).unwrap();
    assert_eq!(keys.ensure(&host).unwrap(), KeyProvision::AlreadyPresent);
    assert_eq!(fs::read(keys.private_key()).unwrap(), private);
    assert_eq!(fs::read(keys.public_key()).unwrap(), public);

    fs::remove_file(keys.public_key()).unwrap();
    assert_eq!(keys.ensure(&host).unwrap(), KeyProvision::Generated);
    assert_ne!(fs::read(keys.private_key()).unwrap(), private);
}

#[test]
fn schedule_registration_never_duplicates() {
    let fixture = ProjectFixture::new();
    let host = FakeRunner::debian();
    host.set_crontab(Some("@reboot /usr/local/bin/mount-backups\n"));
    let registrar = ScheduleRegistrar::new(
        &host,
        fixture.root().join("stackhostctl"),
        fixture.root(),
        &fixture.paths.update_log,
        &fixture.settings.schedule.expression,
    );

    assert_eq!(registrar.ensure(), ScheduleOutcome::Registered);
    let table = host.crontab().unwrap();
    for _ in 0..3 {
        assert_eq!(registrar.ensure(), ScheduleOutcome::AlreadyRegistered);
    }
    assert_eq!(host.crontab().unwrap(), table);
    assert!(table.starts_with("@reboot /usr/local/bin/mount-backups\n"));
    assert_eq!(table.lines().filter(|line| line.contains("update")).count(), 1);
}

#[test]
fn gated_commands_have_no_side_effects_before_install() {
    for command in [
        LifecycleCommand::Update,
        LifecycleCommand::Start,
        LifecycleCommand::Stop,
    ] {
        let fixture = ProjectFixture::new();
        let host = FakeRunner::debian();
        let config = LifecycleConfig {
            command,
            telemetry: None,
            settings: fixture.settings.clone(),
            paths: fixture.paths.clone(),
            tool_path: fixture.root().join("stackhostctl"),
        };
        let mut prompter = ScriptedPrompter::default();
        let err = Lifecycle::new(&config, &host, &mut prompter).run().unwrap_err();

        assert!(matches!(err, InstallerError::NotInstalled), "{command}");
        assert!(host.invocations().is_empty(), "{command}");
        let entries: Vec<_> = fs::read_dir(fixture.root())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, [".env.example"], "{command}");
    }
}

#[test]
fn second_install_run_converges_on_same_state() {
    let fixture = ProjectFixture::new();
    let host = FakeRunner::debian();
    let install = |answers: &[&str]| {
        let config = LifecycleConfig {
            command: LifecycleCommand::Install,
            telemetry: Some(true),
            settings: fixture.settings.clone(),
            paths: fixture.paths.clone(),
            tool_path: fixture.root().join("stackhostctl"),
        };
        let mut prompter = ScriptedPrompter::new(answers.iter().copied());
        Lifecycle::new(&config, &host, &mut prompter).run()
    };

    install(&["https://demo.example.com", "ghp_token"]).unwrap();
    let private = fixture.read(&fixture.paths.private_key);
    let crontab = host.crontab();

    let outcome = install(&["y", "https://demo.example.com"]).unwrap();
    assert_eq!(outcome, CommandOutcome::Completed);
    assert_eq!(fixture.read(&fixture.paths.private_key), private);
    assert_eq!(host.crontab(), crontab);
    assert!(InstallationState::new(&fixture.paths.marker).is_installed());

    let env = EnvFile::load(&fixture.paths.env_file).unwrap();
    assert_eq!(env.keys().filter(|key| *key == "BASE_URL").count(), 1);
}
