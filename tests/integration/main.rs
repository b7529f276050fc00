//! Integration tests for vibe-validate
//!
//! Every test drives the real binary against a throwaway git repository.
//! HOME and the global config path point into a temp dir so nothing from the
//! developer's machine leaks in.

mod support {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    pub fn vibe() -> Command {
        cargo_bin_cmd!("vibe-validate")
    }

    pub struct TestRepo {
        dir: TempDir,
        home: TempDir,
    }

    impl TestRepo {
        pub fn new() -> Self {
            let repo = Self {
                dir: TempDir::new().unwrap(),
                home: TempDir::new().unwrap(),
            };
            repo.git(&["init", "-q"]);
            repo.git(&["config", "user.name", "Test User"]);
            repo.git(&["config", "user.email", "test@example.com"]);
            repo.git(&["config", "commit.gpgsign", "false"]);
            repo
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }

        pub fn git_dir(&self) -> PathBuf {
            self.dir.path().join(".git")
        }

        pub fn git(&self, args: &[&str]) -> String {
            self.git_in(self.path(), args)
        }

        fn git_in(&self, dir: &Path, args: &[&str]) -> String {
            let output = std::process::Command::new("git")
                .args(args)
                .current_dir(dir)
                .env("HOME", self.home.path())
                .env("GIT_CONFIG_NOSYSTEM", "1")
                .env_remove("GIT_INDEX_FILE")
                .output()
                .unwrap();
            assert!(
                output.status.success(),
                "git {:?} failed: {}",
                args,
                String::from_utf8_lossy(&output.stderr)
            );
            String::from_utf8_lossy(&output.stdout).to_string()
        }

        /// Clone a fresh one-commit repository into `path` as a submodule.
        /// Its `lib.txt` holds "v1\n".
        pub fn add_submodule(&self, path: &str) {
            let upstream = self.home.path().join(format!("upstream-{}", path.replace('/', "-")));
            fs::create_dir_all(&upstream).unwrap();
            fs::write(upstream.join("lib.txt"), "v1\n").unwrap();
            self.git_in(&upstream, &["init", "-q"]);
            self.git_in(&upstream, &["add", "lib.txt"]);
            self.git_in(
                &upstream,
                &[
                    "-c",
                    "user.name=Test User",
                    "-c",
                    "user.email=test@example.com",
                    "-c",
                    "commit.gpgsign=false",
                    "commit",
                    "-q",
                    "-m",
                    "init",
                ],
            );

            let url = upstream.to_string_lossy();
            self.git(&[
                "-c",
                "protocol.file.allow=always",
                "submodule",
                "add",
                "-q",
                &url,
                path,
            ]);
        }

        pub fn write(&self, relative: &str, content: &str) {
            let path = self.path().join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }

        /// The binary, isolated from the caller's home and git config
        pub fn cmd_in(&self, relative: &str) -> Command {
            let mut cmd = vibe();
            cmd.current_dir(self.path().join(relative))
                .env("HOME", self.home.path())
                .env("XDG_CONFIG_HOME", self.home.path().join(".config"))
                .env("GIT_CONFIG_NOSYSTEM", "1")
                .env("VIBE_VALIDATE_CONFIG", self.home.path().join("config.toml"))
                .env_remove("GIT_INDEX_FILE")
                .env_remove("RUST_LOG");
            cmd
        }

        pub fn cmd(&self) -> Command {
            self.cmd_in("")
        }

        /// Run a command with `--force` and return the tree hash from its record
        pub fn tree_hash(&self) -> String {
            let output = self
                .cmd()
                .args(["run", "--force", "--", "true"])
                .output()
                .unwrap();
            assert!(output.status.success());
            tree_hash_of(&String::from_utf8_lossy(&output.stdout))
        }
    }

    pub fn tree_hash_of(document: &str) -> String {
        document
            .lines()
            .find_map(|line| line.strip_prefix("treeHash:"))
            .map(|hash| hash.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
            .unwrap_or_else(|| panic!("no treeHash in output:\n{}", document))
    }
}

mod cli_tests {
    use super::support::vibe;
    use predicates::prelude::*;

    #[test]
    fn help_displays() {
        vibe()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("run"))
            .stdout(predicate::str::contains("validate"));
    }

    #[test]
    fn version_displays() {
        vibe()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn run_requires_a_command() {
        vibe().arg("run").assert().failure();
    }

    #[test]
    fn force_conflicts_with_check() {
        vibe()
            .args(["run", "--force", "--check", "--", "true"])
            .assert()
            .failure();
    }
}

mod fingerprint_tests {
    use super::support::TestRepo;
    use std::fs;

    #[test]
    fn same_content_same_hash() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");

        let first = repo.tree_hash();
        let second = repo.tree_hash();

        assert_eq!(first, second);
        assert_eq!(first.len(), 40);
    }

    #[test]
    fn ignored_files_do_not_count() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        repo.write(".gitignore", "b.txt\n");
        let before = repo.tree_hash();

        repo.write("b.txt", "y");
        let after = repo.tree_hash();

        assert_eq!(before, after);
    }

    #[test]
    fn untracked_files_count() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        let before = repo.tree_hash();

        repo.write("new.txt", "fresh");
        let after = repo.tree_hash();

        assert_ne!(before, after);
    }

    #[test]
    fn edits_change_the_hash_and_reverting_restores_it() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        let original = repo.tree_hash();

        repo.write("a.txt", "changed");
        assert_ne!(repo.tree_hash(), original);

        repo.write("a.txt", "x");
        assert_eq!(repo.tree_hash(), original);
    }

    #[test]
    fn real_index_is_untouched() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        repo.git(&["add", "a.txt"]);
        repo.write("untracked.txt", "u");

        // status may refresh stat data in the index, so read it afterwards
        let status_before = repo.git(&["status", "--porcelain"]);
        let index_before = fs::read(repo.git_dir().join("index")).unwrap();

        repo.tree_hash();

        assert_eq!(fs::read(repo.git_dir().join("index")).unwrap(), index_before);
        assert_eq!(repo.git(&["status", "--porcelain"]), status_before);
        assert!(status_before.contains("?? untracked.txt"));
    }

    #[test]
    fn no_shadow_index_left_behind() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");

        repo.tree_hash();

        let leftovers: Vec<_> = fs::read_dir(repo.git_dir())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("vibe-validate-temp-index-"))
            .collect();
        assert!(leftovers.is_empty(), "leftover shadow files: {:?}", leftovers);
    }

    #[test]
    fn no_commits_or_head_movement() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        repo.git(&["add", "a.txt"]);
        repo.git(&["commit", "-q", "-m", "initial"]);
        let head = repo.git(&["rev-parse", "HEAD"]);

        repo.write("a.txt", "dirty");
        repo.tree_hash();

        assert_eq!(repo.git(&["rev-parse", "HEAD"]), head);
    }
}

mod run_tests {
    use super::support::{tree_hash_of, TestRepo};
    use predicates::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn miss_then_hit_replays_exit_code() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");

        repo.cmd()
            .args(["run", "--", "exit 3"])
            .assert()
            .code(3)
            .stdout(predicate::str::contains("exitCode: 3"))
            .stdout(predicate::str::contains("isCachedResult").not());

        repo.cmd()
            .args(["run", "--", "exit 3"])
            .assert()
            .code(3)
            .stdout(predicate::str::contains("isCachedResult: true"));
    }

    #[test]
    fn hit_does_not_execute_again() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");

        repo.cmd()
            .args(["run", "--", "echo side-effect-output"])
            .assert()
            .success()
            .stderr(predicate::str::contains("side-effect-output"));

        // A hit replays the record, not the raw output
        repo.cmd()
            .args(["run", "--", "echo side-effect-output"])
            .assert()
            .success()
            .stdout(predicate::str::contains("isCachedResult: true"))
            .stderr(predicate::str::contains("side-effect-output").not());
    }

    #[test]
    fn force_reruns_and_refreshes() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");

        repo.cmd().args(["run", "--", "echo hi"]).assert().success();
        repo.cmd()
            .args(["run", "--force", "--", "echo hi"])
            .assert()
            .success()
            .stdout(predicate::str::contains("isCachedResult").not())
            .stderr(predicate::str::contains("hi"));
    }

    #[test]
    fn check_reports_status_without_running() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");

        // Would create a file if it ever ran
        repo.cmd()
            .args(["run", "--check", "--", "touch ran.txt"])
            .assert()
            .code(1)
            .stdout(predicate::str::is_empty());
        assert!(!repo.path().join("ran.txt").exists());

        repo.cmd().args(["run", "--", "echo hi"]).assert().success();
        repo.cmd()
            .args(["run", "--check", "--", "echo hi"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn content_change_is_a_miss() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        repo.cmd().args(["run", "--", "echo hi"]).assert().success();

        repo.write("a.txt", "y");
        repo.cmd()
            .args(["run", "--check", "--", "echo hi"])
            .assert()
            .code(1);
    }

    #[test]
    fn invocation_style_shares_the_entry() {
        let repo = TestRepo::new();
        repo.write("packages/cli/index.js", "module.exports = 1;\n");

        repo.cmd()
            .args(["run", "--cwd", "packages/cli", "--", "pwd"])
            .assert()
            .success()
            .stdout(predicate::str::contains("workdir: packages/cli"));

        repo.cmd_in("packages/cli")
            .args(["run", "--", "pwd"])
            .assert()
            .success()
            .stdout(predicate::str::contains("isCachedResult: true"));

        // The repository root is a different entry
        repo.cmd()
            .args(["run", "--check", "--", "pwd"])
            .assert()
            .code(1);
    }

    #[test]
    fn failing_command_records_diagnostics() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");

        repo.cmd()
            .args([
                "run",
                "--",
                "echo 'src/main.ts:4:7: error TS2322: Type mismatch'; exit 2",
            ])
            .assert()
            .code(2)
            .stdout(predicate::str::contains("file: src/main.ts"))
            .stdout(predicate::str::contains("code: TS2322"));
    }

    #[test]
    fn nested_invocation_is_unwrapped() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        let inner = "printf '%s\\n' '---' 'treeHash: inner' 'command: npm test' \
                     'workdir: packages/cli' 'timestamp: 2026-01-01T00:00:00Z' \
                     'exitCode: 0' 'duration: 5' 'summary: inner summary'";

        repo.cmd()
            .args(["run", "--", inner])
            .assert()
            .success()
            .stdout(predicate::str::contains("summary: inner summary"))
            .stdout(predicate::str::contains("suggestedDirectCommand: npm test"));
    }

    #[test]
    fn cache_list_and_clear() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        let output = repo
            .cmd()
            .args(["run", "--", "echo hi"])
            .output()
            .unwrap();
        let tree = tree_hash_of(&String::from_utf8_lossy(&output.stdout));

        repo.cmd()
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!(
                "refs/notes/vibe-validate/run/{}/",
                tree
            )));

        repo.cmd()
            .args(["cache", "clear", "--yes"])
            .assert()
            .success();

        repo.cmd()
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
        repo.cmd()
            .args(["run", "--check", "--", "echo hi"])
            .assert()
            .code(1);
    }

    #[test]
    fn disabled_cache_always_runs() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        repo.write("vibe-validate.toml", "[cache]\nenabled = false\n");

        repo.cmd().args(["run", "--", "echo hi"]).assert().success();
        repo.cmd()
            .args(["run", "--", "echo hi"])
            .assert()
            .success()
            .stdout(predicate::str::contains("isCachedResult").not());
    }

    #[test]
    fn outside_a_repository_runs_uncached() {
        let dir = TempDir::new().unwrap();
        super::support::vibe()
            .current_dir(dir.path())
            .env("GIT_CEILING_DIRECTORIES", dir.path())
            .env("VIBE_VALIDATE_CONFIG", dir.path().join("config.toml"))
            .args(["run", "--", "echo plain-run"])
            .assert()
            .success()
            .stderr(predicate::str::contains("plain-run"));
    }

    #[test]
    fn cache_commands_need_a_repository() {
        let dir = TempDir::new().unwrap();
        super::support::vibe()
            .current_dir(dir.path())
            .env("GIT_CEILING_DIRECTORIES", dir.path())
            .env("VIBE_VALIDATE_CONFIG", dir.path().join("config.toml"))
            .args(["cache", "list"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Error"));
    }

    #[test]
    fn check_outside_a_repository_is_an_error_not_a_miss() {
        let dir = TempDir::new().unwrap();
        super::support::vibe()
            .current_dir(dir.path())
            .env("GIT_CEILING_DIRECTORIES", dir.path())
            .env("VIBE_VALIDATE_CONFIG", dir.path().join("config.toml"))
            .args(["run", "--check", "--", "echo hi"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Error"));
    }
}

mod validate_tests {
    use super::support::TestRepo;
    use predicates::prelude::*;

    const STEPS: &str = r#"
[[validation.steps]]
name = "lint"
command = "true"

[[validation.steps]]
name = "test"
command = "echo tested"
"#;

    #[test]
    fn records_passing_run_and_skips_next_time() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        repo.write("vibe-validate.toml", STEPS);

        repo.cmd()
            .args(["validate", "--check"])
            .assert()
            .code(1);
        repo.cmd().arg("validate").assert().success();
        repo.cmd()
            .args(["validate", "--check"])
            .assert()
            .success();
        repo.cmd()
            .arg("validate")
            .assert()
            .success()
            .stderr(predicate::str::contains("already passed"));

        repo.cmd()
            .args(["history", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"passed\": true"));
    }

    #[test]
    fn failing_step_fails_validation() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        repo.write(
            "vibe-validate.toml",
            r#"
[[validation.steps]]
name = "broken"
command = "exit 4"

[[validation.steps]]
name = "never"
command = "touch never-ran.txt"
"#,
        );

        repo.cmd()
            .arg("validate")
            .assert()
            .code(1)
            .stdout(predicate::str::contains("exitCode: 4"));
        assert!(!repo.path().join("never-ran.txt").exists());

        repo.cmd()
            .args(["history", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("failedStep: broken"));
    }

    #[test]
    fn no_steps_is_an_error() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");

        repo.cmd().arg("validate").assert().code(2);
    }

    #[test]
    fn validate_check_outside_a_repository_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        super::support::vibe()
            .current_dir(dir.path())
            .env("GIT_CEILING_DIRECTORIES", dir.path())
            .env("VIBE_VALIDATE_CONFIG", dir.path().join("config.toml"))
            .args(["validate", "--check"])
            .assert()
            .code(2);
    }

    #[test]
    fn submodule_edit_invalidates_a_passing_run() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        repo.write("vibe-validate.toml", STEPS);
        repo.add_submodule("vendor/lib");

        repo.cmd().arg("validate").assert().success();
        repo.cmd().args(["validate", "--check"]).assert().success();

        repo.write("vendor/lib/lib.txt", "v2\n");
        repo.cmd().args(["validate", "--check"]).assert().code(1);
        repo.cmd()
            .arg("validate")
            .assert()
            .success()
            .stderr(predicate::str::contains("already passed").not());
        repo.cmd().args(["validate", "--check"]).assert().success();
    }

    #[test]
    fn legacy_notes_are_removed() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        repo.write("vibe-validate.toml", STEPS);
        let blob = repo.git(&["hash-object", "-w", "a.txt"]);
        repo.git(&[
            "notes",
            "--ref=refs/notes/vibe-validate/runs",
            "add",
            "-m",
            "old",
            blob.trim(),
        ]);

        repo.cmd().arg("validate").assert().success();

        let refs = repo.git(&["for-each-ref", "--format=%(refname)", "refs/notes/"]);
        assert!(!refs.contains("refs/notes/vibe-validate/runs"), "{}", refs);
    }

    #[test]
    fn history_prune_all_needs_confirmation() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        repo.write("vibe-validate.toml", STEPS);
        repo.cmd().arg("validate").assert().success();

        repo.cmd()
            .args(["history", "prune", "--all"])
            .assert()
            .failure();
        repo.cmd()
            .args(["history", "prune", "--all", "--yes"])
            .assert()
            .success();
        repo.cmd()
            .args(["history", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn history_health_never_fails() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");

        repo.cmd().args(["history", "health"]).assert().success();
    }
}

mod submodule_tests {
    use super::support::TestRepo;
    use predicates::prelude::*;

    #[test]
    fn dirty_submodule_is_a_miss_until_reverted() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        repo.add_submodule("vendor/lib");

        repo.cmd().args(["run", "--", "echo hi"]).assert().success();
        repo.cmd()
            .args(["run", "--check", "--", "echo hi"])
            .assert()
            .success();
        let clean = repo.tree_hash();

        // The gitlink still points at the same commit
        repo.write("vendor/lib/lib.txt", "v2\n");
        assert_eq!(repo.tree_hash(), clean);
        repo.cmd()
            .args(["run", "--check", "--", "echo hi"])
            .assert()
            .code(1);

        repo.write("vendor/lib/lib.txt", "v1\n");
        repo.cmd()
            .args(["run", "--", "echo hi"])
            .assert()
            .success()
            .stdout(predicate::str::contains("isCachedResult: true"));
    }

    #[test]
    fn untracked_file_in_submodule_is_a_miss() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        repo.add_submodule("vendor/lib");

        repo.cmd().args(["run", "--", "echo hi"]).assert().success();
        repo.write("vendor/lib/new.txt", "new");
        repo.cmd()
            .args(["run", "--check", "--", "echo hi"])
            .assert()
            .code(1);
    }

    #[test]
    fn uninitialised_submodule_is_skipped() {
        let repo = TestRepo::new();
        repo.write("a.txt", "x");
        repo.add_submodule("vendor/lib");
        repo.git(&["submodule", "deinit", "-q", "-f", "vendor/lib"]);

        repo.cmd()
            .args(["run", "--", "echo hi"])
            .assert()
            .success()
            .stdout(predicate::str::contains("isCachedResult").not());
        repo.cmd()
            .args(["run", "--", "echo hi"])
            .assert()
            .success()
            .stdout(predicate::str::contains("isCachedResult: true"));
    }
}

mod config_tests {
    use super::support::TestRepo;
    use predicates::prelude::*;

    #[test]
    fn config_path() {
        let repo = TestRepo::new();
        repo.cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let repo = TestRepo::new();
        repo.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn local_config_overrides_global() {
        let repo = TestRepo::new();
        repo.write("vibe-validate.toml", "[history]\nmax_entries = 42\n");

        repo.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("max_entries = 42"));

        repo.cmd()
            .args(["--no-local", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("max_entries = 1000"));
    }

    #[test]
    fn config_set_local_writes_project_file() {
        let repo = TestRepo::new();
        repo.cmd()
            .args(["config", "set", "cache.enabled", "false", "--local"])
            .assert()
            .success();

        let content = std::fs::read_to_string(repo.path().join("vibe-validate.toml")).unwrap();
        assert!(content.contains("enabled = false"));
    }

    #[test]
    fn config_set_rejects_unknown_key() {
        let repo = TestRepo::new();
        repo.cmd()
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure();
    }
}
