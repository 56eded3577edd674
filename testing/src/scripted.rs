use std::{
    collections::VecDeque,
    io,
    path::Path,
    sync::Mutex,
    thread,
    time::Duration,
};
use swarmcore::command::{
    CommandOutput,
    Echo,
    Runner,
};

struct Rule {
    word: String,
    responses: VecDeque<CommandOutput>,
    delay: Duration,
}

/// A `Runner` answering from canned outputs, safe to share across threads.
///
/// A call is answered by the first rule whose word appears in its
/// argument vector.  Queued responses are consumed in order and the last
/// one repeats.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, word: &str, output: CommandOutput) -> Self {
        self.on_seq(word, [output])
    }

    pub fn on_seq(self, word: &str, outputs: impl IntoIterator<Item = CommandOutput>) -> Self {
        self.push_rule(word, outputs, Duration::ZERO)
    }

    /// Like `on`, but the call takes `delay` before answering.
    pub fn on_slow(self, word: &str, output: CommandOutput, delay: Duration) -> Self {
        self.push_rule(word, [output], delay)
    }

    fn push_rule(
        self,
        word: &str,
        outputs: impl IntoIterator<Item = CommandOutput>,
        delay: Duration,
    ) -> Self {
        self.rules.lock().expect("rules poisoned").push(Rule {
            word: word.to_string(),
            responses: outputs.into_iter().collect(),
            delay,
        });
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("calls poisoned").clone()
    }

    /// Number of calls whose argument vector contains `word`.
    pub fn count(&self, word: &str) -> usize {
        self.calls.lock().expect("calls poisoned")
            .iter()
            .filter(|argv| argv.iter().any(|arg| arg == word))
            .count()
    }
}

impl Runner for ScriptedRunner {
    fn run(
        &self,
        argv: &[String],
        _working_dir: &Path,
        _echo: Echo,
    ) -> io::Result<CommandOutput> {
        self.calls.lock().expect("calls poisoned").push(argv.to_vec());
        let (output, delay) = {
            let mut rules = self.rules.lock().expect("rules poisoned");
            let rule = rules.iter_mut()
                .find(|rule| argv.iter().any(|arg| *arg == rule.word))
                .ok_or_else(|| io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no scripted response for {argv:?}"),
                ))?;
            let output = if rule.responses.len() > 1 {
                rule.responses.pop_front()
            } else {
                rule.responses.front().cloned()
            };
            (output, rule.delay)
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        output.ok_or_else(|| io::Error::new(io::ErrorKind::Other, "empty scripted response"))
    }
}
