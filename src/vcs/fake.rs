//! In-memory git stand-in for unit tests
//!
//! Understands the notes and ref plumbing the cache and history stores use.
//! Anything else is answered from canned responses or fails.

use crate::error::VibeResult;
use crate::vcs::{ExecOptions, VcsExecutor, VcsOutput};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct FakeVcs {
    /// refname -> (annotated object -> note content)
    refs: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    canned: Mutex<HashMap<String, VcsOutput>>,
    calls: Mutex<Vec<Vec<String>>>,
    /// (ref, object, content) written just before the next update of that ref
    interleaved: Mutex<Option<(String, String, String)>>,
    fail_writes: bool,
    fail_ref_deletes: bool,
}

fn full_ref(name: &str) -> String {
    if name.starts_with("refs/") {
        name.to_string()
    } else {
        format!("refs/notes/{}", name)
    }
}

fn blob_id(content: &str) -> String {
    hex::encode(&Sha256::digest(content.as_bytes())[..20])
}

/// Stand-in commit id: equal note sets share an id
fn tip_id(notes: &BTreeMap<String, String>) -> String {
    let flat: String = notes
        .iter()
        .map(|(object, content)| format!("{}\0{}\0", object, content))
        .collect();
    blob_id(&format!("commit\0{}", flat))
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `notes add` fails
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// Every `update-ref -d` fails
    pub fn failing_ref_deletes() -> Self {
        Self {
            fail_ref_deletes: true,
            ..Self::default()
        }
    }

    /// Answer `args` (joined with spaces) with a fixed output
    pub fn respond(&self, args: &str, output: VcsOutput) {
        self.canned.lock().unwrap().insert(args.to_string(), output);
    }

    /// Seed a note directly
    pub fn insert_note(&self, ref_name: &str, object: &str, content: &str) {
        self.refs
            .lock()
            .unwrap()
            .entry(full_ref(ref_name))
            .or_default()
            .insert(object.to_string(), content.to_string());
    }

    pub fn note(&self, ref_name: &str, object: &str) -> Option<String> {
        self.refs
            .lock()
            .unwrap()
            .get(&full_ref(ref_name))
            .and_then(|notes| notes.get(object).cloned())
    }

    pub fn ref_names(&self) -> Vec<String> {
        self.refs.lock().unwrap().keys().cloned().collect()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Simulate another process writing a note right before our next swap of `ref_name`
    pub fn interleave_before_next_swap(&self, ref_name: &str, object: &str, content: &str) {
        *self.interleaved.lock().unwrap() = Some((
            full_ref(ref_name),
            object.to_string(),
            content.to_string(),
        ));
    }

    /// `update-ref <ref> <new> [<old>]`, with `old` checked like git does
    fn update_ref(&self, ref_name: &str, new: &str, old: Option<&str>) -> VcsOutput {
        let pending = self
            .interleaved
            .lock()
            .unwrap()
            .take_if(|pending| pending.0 == ref_name);
        let mut refs = self.refs.lock().unwrap();
        if let Some((target, object, content)) = pending {
            refs.entry(target).or_default().insert(object, content);
        }

        let Some(source) = refs.values().find(|notes| tip_id(notes) == new).cloned() else {
            return VcsOutput::failed(128, format!("fatal: {}: not a valid SHA1", new));
        };
        if let Some(old) = old {
            let current = refs.get(ref_name).map(tip_id);
            let expected = (!old.is_empty()).then(|| old.to_string());
            if current != expected {
                return VcsOutput::failed(
                    1,
                    format!("fatal: cannot lock ref '{}': reference moved", ref_name),
                );
            }
        }
        refs.insert(ref_name.to_string(), source);
        VcsOutput::ok("")
    }

    fn notes(&self, ref_name: &str, rest: &[&str], options: &ExecOptions) -> VcsOutput {
        let ref_name = full_ref(ref_name);
        let mut refs = self.refs.lock().unwrap();
        match rest {
            ["show", object] => refs
                .get(&ref_name)
                .and_then(|notes| notes.get(*object))
                .map(|content| VcsOutput::ok(content.clone()))
                .unwrap_or_else(|| {
                    VcsOutput::failed(1, format!("error: no note found for object {}.", object))
                }),
            ["add", "-f", "-F", "-", object] => {
                if self.fail_writes {
                    return VcsOutput::failed(128, "fatal: unable to write note");
                }
                let content = options.stdin.clone().unwrap_or_default();
                refs.entry(ref_name)
                    .or_default()
                    .insert(object.to_string(), content);
                VcsOutput::ok("")
            }
            ["list"] => {
                let listing = refs
                    .get(&ref_name)
                    .map(|notes| {
                        notes
                            .iter()
                            .map(|(object, content)| format!("{} {}\n", blob_id(content), object))
                            .collect::<String>()
                    })
                    .unwrap_or_default();
                VcsOutput::ok(listing)
            }
            ["remove", "--ignore-missing", object] => {
                if let Some(notes) = refs.get_mut(&ref_name) {
                    notes.remove(*object);
                }
                VcsOutput::ok("")
            }
            ["remove", object] => {
                let removed = refs
                    .get_mut(&ref_name)
                    .and_then(|notes| notes.remove(*object))
                    .is_some();
                if removed {
                    VcsOutput::ok("")
                } else {
                    VcsOutput::failed(1, format!("error: Object {} has no note", object))
                }
            }
            _ => VcsOutput::failed(129, "fake: unsupported notes invocation"),
        }
    }
}

#[async_trait]
impl VcsExecutor for FakeVcs {
    async fn exec(&self, args: &[&str], options: &ExecOptions) -> VibeResult<VcsOutput> {
        self.calls
            .lock()
            .unwrap()
            .push(args.iter().map(|a| a.to_string()).collect());

        if let Some(output) = self.canned.lock().unwrap().get(&args.join(" ")) {
            return Ok(output.clone());
        }

        let output = match args {
            ["notes", ref_arg, rest @ ..] if ref_arg.starts_with("--ref=") => {
                self.notes(&ref_arg["--ref=".len()..], rest, options)
            }
            ["for-each-ref", "--format=%(refname)", prefix] => {
                let listing = self
                    .refs
                    .lock()
                    .unwrap()
                    .keys()
                    .filter(|name| {
                        name.as_str() == *prefix
                            || name.starts_with(prefix.trim_end_matches('/'))
                                && name[prefix.trim_end_matches('/').len()..].starts_with('/')
                    })
                    .map(|name| format!("{}\n", name))
                    .collect::<String>();
                VcsOutput::ok(listing)
            }
            ["update-ref", "-d", ref_name] => {
                if self.fail_ref_deletes {
                    VcsOutput::failed(1, "error: cannot lock ref")
                } else {
                    self.refs.lock().unwrap().remove(*ref_name);
                    VcsOutput::ok("")
                }
            }
            ["update-ref", ref_name, new] => self.update_ref(ref_name, new, None),
            ["update-ref", ref_name, new, old] => self.update_ref(ref_name, new, Some(old)),
            ["rev-parse", "--verify", "-q", ref_name] => {
                match self.refs.lock().unwrap().get(*ref_name) {
                    Some(notes) => VcsOutput::ok(format!("{}\n", tip_id(notes))),
                    None => VcsOutput::failed(1, ""),
                }
            }
            _ => VcsOutput::failed(129, format!("fake: unsupported git {}", args.join(" "))),
        };
        Ok(output)
    }
}
