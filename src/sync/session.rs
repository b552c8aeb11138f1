//! Interactive selection of a discovered configuration

use std::io::{BufRead, Write};

use super::{DiscoveryReport, PeerObfuscation};
use crate::device::DeviceConfig;
use crate::error::Result;
use crate::prefs::PrefsEditor;
use crate::prompt::Prompter;

/// How a sync session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Parameters adopted from the named peer
    Applied { peer: String, desired: DeviceConfig },
    /// Operator kept the current configuration
    Cancelled,
    /// Nothing to choose from
    NothingFound,
}

/// Selection and apply over one discovery report. Going back to the list
/// reuses the report; discovery is never run again.
pub struct SyncSession<'a> {
    candidates: &'a [PeerObfuscation],
}

impl<'a> SyncSession<'a> {
    pub fn new(report: &'a DiscoveryReport) -> Self {
        Self { candidates: &report.configs }
    }

    pub fn candidates(&self) -> &'a [PeerObfuscation] {
        self.candidates
    }

    /// Numbered candidate list with compact parameters
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, candidate) in self.candidates.iter().enumerate() {
            out.push_str(&format!(
                "[{}] {} ({})\n   Parameters: {}\n",
                i + 1,
                candidate.peer.label(),
                candidate.peer.address,
                candidate.params.compact()
            ));
        }
        out
    }

    /// Let the operator pick a candidate and confirm it. Answering "no"
    /// returns to the list. `None` when the operator cancels.
    pub fn select<R: BufRead, W: Write>(
        &self,
        prompter: &mut Prompter<R, W>,
    ) -> Result<Option<&'a PeerObfuscation>> {
        let candidates = self.candidates;
        'list: loop {
            prompter.say("Select a configuration to sync to this node:")?;
            prompter.say("0. Cancel (keep current configuration)")?;
            for (i, candidate) in candidates.iter().enumerate() {
                prompter.say(format!(
                    "{}. Sync from {} ({})",
                    i + 1,
                    candidate.peer.label(),
                    candidate.peer.address
                ))?;
            }

            let Some(choice) = prompter.ask("\nChoice [0]: ")? else {
                return Ok(None);
            };
            if choice.is_empty() || choice == "0" {
                return Ok(None);
            }
            let selected = match choice.parse::<usize>() {
                Ok(n) if (1..=candidates.len()).contains(&n) => &candidates[n - 1],
                _ => {
                    prompter.say(format!("Invalid choice: {}\n", choice))?;
                    continue 'list;
                }
            };

            prompter.say(format!("\nSelected configuration from {}:", selected.peer.label()))?;
            prompter.say(selected.params.detailed().trim_end())?;

            match prompter.confirm("\nApply this configuration? [Y/n=return to list]: ", true)? {
                Some(true) => return Ok(Some(selected)),
                Some(false) => {
                    prompter.say("Not applied. Returning to list.\n")?;
                    continue 'list;
                }
                None => return Ok(None),
            }
        }
    }

    /// Adopt `choice`: the stored configuration keeps its keys and peers and
    /// takes the candidate's obfuscation parameters.
    pub fn apply(
        &self,
        choice: &PeerObfuscation,
        editor: &dyn PrefsEditor,
    ) -> Result<DeviceConfig> {
        let desired = editor.edit_obfuscation(choice.params.clone())?;
        tracing::info!("Synced obfuscation parameters from {}", choice.peer.label());
        Ok(desired)
    }

    /// Full interactive flow: list, select, confirm, apply
    pub fn run<R: BufRead, W: Write>(
        &self,
        prompter: &mut Prompter<R, W>,
        editor: &dyn PrefsEditor,
    ) -> Result<SyncOutcome> {
        if self.candidates.is_empty() {
            prompter.say("No obfuscation configurations found on online peers.")?;
            return Ok(SyncOutcome::NothingFound);
        }

        prompter.say(format!("Found configurations on {} peer(s):\n", self.candidates.len()))?;
        prompter.say(self.render())?;

        match self.select(prompter)? {
            Some(choice) => {
                let desired = self.apply(choice, editor)?;
                prompter.say(format!("Configuration synced from {}", choice.peer.label()))?;
                Ok(SyncOutcome::Applied { peer: choice.peer.label(), desired })
            }
            None => {
                prompter.say("Cancelled.")?;
                Ok(SyncOutcome::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::key::{NodePrivate, NodePublic};
    use crate::obfuscation::ObfuscationParams;
    use crate::sync::PeerInfo;
    use std::io::Cursor;
    use std::sync::Mutex;

    /// In-memory editor recording every applied configuration
    struct MemoryPrefs {
        current: Mutex<DeviceConfig>,
        applied: Mutex<Vec<DeviceConfig>>,
    }

    impl MemoryPrefs {
        fn new(current: DeviceConfig) -> Self {
            Self { current: Mutex::new(current), applied: Mutex::new(Vec::new()) }
        }
    }

    impl PrefsEditor for MemoryPrefs {
        fn load(&self) -> Result<DeviceConfig> {
            Ok(self.current.lock().unwrap().clone())
        }

        fn apply(&self, desired: &DeviceConfig) -> Result<()> {
            *self.current.lock().unwrap() = desired.clone();
            self.applied.lock().unwrap().push(desired.clone());
            Ok(())
        }
    }

    fn report() -> DiscoveryReport {
        let candidate = |b: u8, name: &str, jc: u16| PeerObfuscation {
            peer: PeerInfo {
                public_key: NodePublic::from_bytes([b; 32]),
                name: name.to_string(),
                address: format!("100.64.0.{}:7655", b),
            },
            params: ObfuscationParams { jc, jmin: 64, jmax: 96, ..Default::default() },
        };
        DiscoveryReport {
            configs: vec![candidate(1, "alpha", 3), candidate(2, "bravo", 5)],
            ..Default::default()
        }
    }

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn current() -> DeviceConfig {
        DeviceConfig::new(
            NodePrivate::from_bytes([9; 32]),
            vec![crate::device::PeerConfig::new(NodePublic::from_bytes([1; 32]))],
            ObfuscationParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_render() {
        let report = report();
        let text = SyncSession::new(&report).render();
        assert!(text.contains("[1] alpha (100.64.0.1:7655)"));
        assert!(text.contains("Parameters: JC=5, JMin=64, JMax=96"));
    }

    #[test]
    fn test_decline_returns_to_list_then_apply() {
        let report = report();
        let session = SyncSession::new(&report);
        let editor = MemoryPrefs::new(current());
        let mut p = prompter("1\nn\n7\n2\ny\n");

        let outcome = session.run(&mut p, &editor).unwrap();
        let applied = editor.applied.lock().unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].obfuscation.jc, 5);
        assert_eq!(applied[0].peers, current().peers);
        assert_eq!(applied[0].private_key, current().private_key);
        assert!(matches!(outcome, SyncOutcome::Applied { ref peer, .. } if peer == "bravo"));

        let out = String::from_utf8(p.into_output()).unwrap();
        assert!(out.contains("Not applied. Returning to list."));
        assert!(out.contains("Invalid choice: 7"));
        assert_eq!(out.matches("0. Cancel").count(), 3);
    }

    #[test]
    fn test_empty_answer_confirms() {
        let report = report();
        let session = SyncSession::new(&report);
        let mut p = prompter("1\n\n");
        let choice = session.select(&mut p).unwrap().unwrap();
        assert_eq!(choice.peer.name, "alpha");
    }

    #[test]
    fn test_cancel_and_eof() {
        let report = report();
        let session = SyncSession::new(&report);
        let editor = MemoryPrefs::new(current());
        assert_eq!(session.run(&mut prompter("0\n"), &editor).unwrap(), SyncOutcome::Cancelled);
        assert_eq!(session.run(&mut prompter("2\n"), &editor).unwrap(), SyncOutcome::Cancelled);
        assert!(editor.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn test_nothing_found() {
        let report = DiscoveryReport::default();
        let editor = MemoryPrefs::new(current());
        let outcome = SyncSession::new(&report).run(&mut prompter(""), &editor).unwrap();
        assert_eq!(outcome, SyncOutcome::NothingFound);
    }

    #[test]
    fn test_invalid_candidate_not_applied() {
        let mut report = report();
        report.configs[0].params = ObfuscationParams { jmin: 500, jmax: 100, ..Default::default() };
        let editor = MemoryPrefs::new(current());
        let session = SyncSession::new(&report);
        let result = session.apply(&report.configs[0], &editor);
        assert!(matches!(result, Err(Error::Params(_))));
        assert!(editor.applied.lock().unwrap().is_empty());
    }
}
