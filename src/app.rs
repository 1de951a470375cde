use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::config::Config;
use crate::engine::{ScoreModel, WeightedSelector};
use crate::error::DrillError;
use crate::session::SessionState;
use crate::store::{DurableStore, PersistenceBridge};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Menu,
    Practice,
    AddWord,
    Statistics,
    Quit,
}

/// What a mode handler asks the loop to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Stay,
    Go(Mode),
    /// Flush and stop. A failed flush falls back to the menu.
    Exit,
}

type Handler<S> = fn(&mut App<S>, &str, DateTime<Utc>) -> Result<Transition>;

pub struct App<S: DurableStore> {
    pub mode: Mode,
    pub config: Config,
    pub session: SessionState,
    bridge: PersistenceBridge<S>,
    model: ScoreModel,
    selector: WeightedSelector,
    rng: SmallRng,
    asking: Option<u64>,
    output: Vec<String>,
}

impl<S: DurableStore> App<S> {
    pub fn new(config: Config, bridge: PersistenceBridge<S>, now: DateTime<Utc>) -> Result<Self> {
        Self::with_rng(config, bridge, now, SmallRng::from_entropy())
    }

    pub fn with_rng(
        config: Config,
        bridge: PersistenceBridge<S>,
        now: DateTime<Utc>,
        rng: SmallRng,
    ) -> Result<Self> {
        let mut session = bridge.load()?;
        let model = config.score_model();
        if !session.is_empty() {
            session.update_all_scores(&model, now.date_naive())?;
        }

        let mut app = Self {
            mode: Mode::Menu,
            selector: config.selector(),
            config,
            session,
            bridge,
            model,
            rng,
            asking: None,
            output: Vec::new(),
        };
        app.say(format!(
            "{} words loaded, {} practice events on record.",
            app.session.entries().len(),
            app.session.merged_activity_history().count()
        ));
        Ok(app)
    }

    pub fn is_finished(&self) -> bool {
        self.mode == Mode::Quit
    }

    pub fn prompt(&self) -> &'static str {
        match self.mode {
            Mode::Menu => "[p]ractice  [a]dd word  [s]tatistics  [q]uit > ",
            Mode::Practice => "answer (empty for menu) > ",
            Mode::AddWord => "word = translation (empty for menu) > ",
            Mode::Statistics => "press enter > ",
            Mode::Quit => "",
        }
    }

    /// Lines produced since the last call.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    fn say(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    /// Feed one line of user input to the current mode.
    pub fn handle(&mut self, input: &str, now: DateTime<Utc>) -> Result<()> {
        let handler: Handler<S> = match self.mode {
            Mode::Menu => Self::handle_menu,
            Mode::Practice => Self::handle_practice,
            Mode::AddWord => Self::handle_add_word,
            Mode::Statistics => Self::handle_statistics,
            Mode::Quit => return Ok(()),
        };
        let transition = handler(self, input.trim(), now)?;
        self.apply(transition, now)
    }

    /// End of input: behave like quitting from the menu.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.apply(Transition::Exit, now)
    }

    fn apply(&mut self, transition: Transition, now: DateTime<Utc>) -> Result<()> {
        match transition {
            Transition::Stay => Ok(()),
            Transition::Go(mode) => self.enter(mode, now),
            Transition::Exit => match self.bridge.flush(&mut self.session) {
                Ok(flushed) => {
                    self.say(format!("Saved {flushed} practice events. Bye!"));
                    self.mode = Mode::Quit;
                    Ok(())
                }
                Err(err) => {
                    self.say(format!("Could not save: {err}. Nothing was lost; try quitting again."));
                    self.mode = Mode::Menu;
                    Ok(())
                }
            },
        }
    }

    fn enter(&mut self, mode: Mode, now: DateTime<Utc>) -> Result<()> {
        self.mode = mode;
        match mode {
            Mode::Practice => self.ask_next(),
            Mode::Statistics => {
                let summary = self
                    .session
                    .summarize(now.date_naive(), &self.config.stats_options());
                for (name, value) in summary.as_map() {
                    let value = value.map_or_else(|| "n/a".to_string(), |v| v.to_string());
                    self.say(format!("{name:<26} {value}"));
                }
                Ok(())
            }
            Mode::Menu | Mode::AddWord | Mode::Quit => Ok(()),
        }
    }

    fn ask_next(&mut self) -> Result<()> {
        let index = self.selector.select(self.session.entries(), &mut self.rng)?;
        let entry = &self.session.entries()[index];
        self.asking = Some(entry.id);
        let question = format!("Translate: {}", entry.source_text);
        self.say(question);
        Ok(())
    }

    fn handle_menu(&mut self, input: &str, _now: DateTime<Utc>) -> Result<Transition> {
        Ok(match input.to_lowercase().as_str() {
            "p" | "practice" => {
                if self.session.is_empty() {
                    self.say("No words yet. Add some first.");
                    Transition::Stay
                } else {
                    Transition::Go(Mode::Practice)
                }
            }
            "a" | "add" => Transition::Go(Mode::AddWord),
            "s" | "stats" => Transition::Go(Mode::Statistics),
            "q" | "quit" => Transition::Exit,
            "" => Transition::Stay,
            other => {
                self.say(format!("Unknown choice: {other}"));
                Transition::Stay
            }
        })
    }

    fn handle_practice(&mut self, input: &str, now: DateTime<Utc>) -> Result<Transition> {
        if input.is_empty() {
            self.asking = None;
            return Ok(Transition::Go(Mode::Menu));
        }
        let Some(word_id) = self.asking else {
            return Ok(Transition::Go(Mode::Menu));
        };
        let Some(entry) = self.session.entry(word_id) else {
            return Err(DrillError::UnknownEntry(word_id).into());
        };

        let expected = entry.target_text.clone();
        let correct = input.to_lowercase() == expected.trim().to_lowercase();
        self.session
            .record_attempt(word_id, correct, now, &self.model)?;
        if correct {
            self.say("Correct!");
        } else {
            self.say(format!("Wrong, it was: {expected}"));
        }

        self.ask_next()?;
        Ok(Transition::Stay)
    }

    fn handle_add_word(&mut self, input: &str, now: DateTime<Utc>) -> Result<Transition> {
        if input.is_empty() {
            return Ok(Transition::Go(Mode::Menu));
        }
        let Some((source, target)) = input.split_once('=') else {
            self.say("Use the form: word = translation");
            return Ok(Transition::Stay);
        };

        let today = now.date_naive();
        match self.session.append_entry(source, target, today) {
            Ok(entry) => {
                let line = format!("Added #{}: {} = {}", entry.id, entry.source_text, entry.target_text);
                self.say(line);
                self.session.update_all_scores(&self.model, today)?;
            }
            Err(err @ (DrillError::DuplicateEntry(_) | DrillError::EmptyText)) => {
                self.say(err.to_string());
            }
            Err(err) => return Err(err.into()),
        }
        Ok(Transition::Stay)
    }

    fn handle_statistics(&mut self, _input: &str, _now: DateTime<Utc>) -> Result<Transition> {
        Ok(Transition::Go(Mode::Menu))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;
    use crate::store::JsonStore;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 10, 0, 0).unwrap()
    }

    fn make_app(dir: &TempDir) -> App<JsonStore> {
        let store = JsonStore::open(dir.path()).unwrap();
        let mut config = Config::default();
        config.data_dir = dir.path().to_string_lossy().to_string();
        App::with_rng(config, PersistenceBridge::new(store), at(1), SmallRng::seed_from_u64(7)).unwrap()
    }

    fn run(app: &mut App<JsonStore>, lines: &[&str], now: DateTime<Utc>) -> Vec<String> {
        for line in lines {
            app.handle(line, now).unwrap();
        }
        app.take_output()
    }

    #[test]
    fn practice_on_empty_vocabulary_stays_in_menu() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir);
        let out = run(&mut app, &["p"], at(1));
        assert_eq!(app.mode, Mode::Menu);
        assert!(out.iter().any(|l| l.contains("No words yet")));
    }

    #[test]
    fn add_then_reject_duplicate() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir);
        let out = run(&mut app, &["a", "Hund = dog", "HUND = hound", ""], at(1));
        assert_eq!(app.mode, Mode::Menu);
        assert_eq!(app.session.entries().len(), 1);
        assert!(out.iter().any(|l| l.contains("already in the vocabulary")));
    }

    #[test]
    fn practice_records_and_quit_persists() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir);
        run(&mut app, &["a", "Hund = dog", ""], at(1));

        let out = run(&mut app, &["p", "dog", "cat", ""], at(2));
        assert!(out.iter().any(|l| l == "Translate: Hund"));
        assert!(out.iter().any(|l| l == "Correct!"));
        assert!(out.iter().any(|l| l == "Wrong, it was: dog"));
        assert_eq!(app.session.pending_events().len(), 2);

        run(&mut app, &["q"], at(2));
        assert!(app.is_finished());

        let reopened = make_app(&dir);
        assert_eq!(reopened.session.max_persisted_id(), 2);
        let entry = reopened.session.entry(1).unwrap();
        assert_eq!((entry.correct_attempts, entry.wrong_attempts), (1, 1));
    }

    #[test]
    fn banner_counts_events_not_highest_id() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        let mut entry = crate::session::VocabularyEntry::new(1, "Hund", "dog", at(1).date_naive());
        entry.correct_attempts = 2;
        entry.last_activity = Some(at(1).date_naive());
        store.write_vocabulary(&[entry]).unwrap();
        let events: Vec<_> = [5, 9]
            .into_iter()
            .map(|id| crate::session::ActivityEvent {
                id,
                word_id: 1,
                correct: true,
                timestamp: at(1),
            })
            .collect();
        store.append_activity_events(&events).unwrap();

        let mut app = make_app(&dir);
        assert_eq!(app.session.max_persisted_id(), 9);
        let out = app.take_output();
        assert_eq!(out[0], "1 words loaded, 2 practice events on record.");
    }

    #[test]
    fn statistics_screen_lists_metrics() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir);
        run(&mut app, &["a", "Hund = dog", "Katze = cat", ""], at(1));
        let out = run(&mut app, &["s"], at(1));
        assert_eq!(app.mode, Mode::Statistics);
        assert!(out.iter().any(|l| l.starts_with("untested_words") && l.ends_with('2')));
        run(&mut app, &[""], at(1));
        assert_eq!(app.mode, Mode::Menu);
    }

    #[test]
    fn malformed_add_input_is_explained() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir);
        let out = run(&mut app, &["a", "Hund dog"], at(1));
        assert_eq!(app.mode, Mode::AddWord);
        assert!(out.iter().any(|l| l.contains("word = translation")));
    }
}
