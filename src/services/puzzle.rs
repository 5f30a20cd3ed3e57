use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::Rng;

use crate::errors::PuzzleError;
use crate::models::{Meal, SlotView};
use crate::utils::{name_len, same_letters, shuffled_letters, take_one};

/// One character position of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Word separator, always shown as a space
    Fixed,
    Letter(Option<char>),
}

impl Slot {
    fn content(&self) -> Option<char> {
        match self {
            Slot::Fixed => Some(' '),
            Slot::Letter(letter) => *letter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect { expected: String },
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Correct => write!(f, "\u{2714} Correct!"),
            Verdict::Incorrect { expected } => {
                write!(f, "\u{274C} Wrong! The right answer was: {}", expected)
            }
        }
    }
}

/// Board of a single unscramble round.
///
/// Letters only ever move between the pool, the held selection and the
/// slots, so together they always spell the target phrase without spaces.
/// Moves that would break that are ignored and reported as not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleState {
    target_phrase: String,
    thumbnail_url: String,
    slots: Vec<Slot>,
    letter_pool: Vec<char>,
    selected_letter: Option<char>,
    started_at: DateTime<Utc>,
}

impl PuzzleState {
    pub fn from_phrase<R: Rng + ?Sized>(phrase: &str, rng: &mut R) -> Self {
        let slots = phrase
            .chars()
            .map(|c| if c == ' ' { Slot::Fixed } else { Slot::Letter(None) })
            .collect();

        Self {
            target_phrase: phrase.to_owned(),
            thumbnail_url: String::new(),
            slots,
            letter_pool: shuffled_letters(phrase, rng),
            selected_letter: None,
            started_at: Utc::now(),
        }
    }

    pub fn from_meal<R: Rng + ?Sized>(meal: &Meal, rng: &mut R) -> Self {
        let mut state = Self::from_phrase(meal.name(), rng);
        state.thumbnail_url = meal.thumbnail_url().to_owned();
        state
    }

    pub fn target_phrase(&self) -> &str {
        &self.target_phrase
    }

    pub fn thumbnail_url(&self) -> &str {
        &self.thumbnail_url
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn letter_pool(&self) -> &[char] {
        &self.letter_pool
    }

    pub fn selected_letter(&self) -> Option<char> {
        self.selected_letter
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Pick a letter up from the pool. A letter already held goes back to
    /// the pool first.
    pub fn select_from_pool(&mut self, letter: char) -> bool {
        if !self.letter_pool.contains(&letter) {
            debug!("Letter '{}' is not in the pool", letter);
            return false;
        }

        if let Some(previous) = self.selected_letter.take() {
            self.letter_pool.push(previous);
        }
        take_one(&mut self.letter_pool, letter);
        self.selected_letter = Some(letter);
        true
    }

    /// Put the held letter back into the pool
    pub fn deselect(&mut self) -> bool {
        match self.selected_letter.take() {
            Some(letter) => {
                self.letter_pool.push(letter);
                true
            }
            None => false,
        }
    }

    pub fn place_in_slot(&mut self, index: usize) -> bool {
        let letter = match self.selected_letter {
            Some(letter) => letter,
            None => {
                debug!("No letter selected for slot {}", index);
                return false;
            }
        };

        match self.slots.get_mut(index) {
            Some(slot) if *slot == Slot::Letter(None) => {
                *slot = Slot::Letter(Some(letter));
                self.selected_letter = None;
                true
            }
            _ => {
                debug!("Slot {} cannot take a letter", index);
                false
            }
        }
    }

    /// Send a placed letter back to the pool
    pub fn clear_slot(&mut self, index: usize) -> bool {
        if let Some(Slot::Letter(letter)) = self.slots.get_mut(index) {
            if let Some(ch) = letter.take() {
                self.letter_pool.push(ch);
                return true;
            }
        }
        false
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|slot| slot.content().is_some())
    }

    /// Board contents as a string; empty slots contribute nothing
    pub fn assembled(&self) -> String {
        self.slots.iter().filter_map(Slot::content).collect()
    }

    pub fn evaluate(&self) -> Verdict {
        if self.assembled() == self.target_phrase {
            Verdict::Correct
        } else {
            Verdict::Incorrect {
                expected: self.target_phrase.clone(),
            }
        }
    }

    /// Slots, pool and selection still spell the target phrase
    pub fn letters_conserved(&self) -> bool {
        let placed = self.slots.iter().filter_map(|slot| match slot {
            Slot::Letter(letter) => *letter,
            Slot::Fixed => None,
        });
        let held = placed
            .chain(self.letter_pool.iter().copied())
            .chain(self.selected_letter);

        same_letters(held, self.target_phrase.chars())
    }

    pub fn slot_views(&self) -> Vec<SlotView> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Fixed => SlotView::Fixed,
                Slot::Letter(None) => SlotView::Empty,
                Slot::Letter(Some(c)) => SlotView::Letter(*c),
            })
            .collect()
    }
}

/// Starts unscramble rounds from randomly fetched meals
#[derive(Debug, Clone)]
pub struct PuzzleEngine {
    max_name_len: usize,
    max_attempts: usize,
}

impl PuzzleEngine {
    pub fn new(max_name_len: usize, max_attempts: usize) -> Self {
        Self {
            max_name_len,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn qualifies(&self, meal: &Meal) -> bool {
        name_len(meal.name()) <= self.max_name_len
    }

    /// Ask the supplier for candidates until one has a short enough name.
    ///
    /// Each call may yield several meals; the first one that fits wins.
    /// Gives up after `max_attempts` calls.
    pub async fn new_round<F, Fut>(&self, mut supplier: F) -> Result<PuzzleState, PuzzleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Vec<Meal>>,
    {
        for attempt in 1..=self.max_attempts {
            let candidates = supplier().await;
            if let Some(meal) = candidates.iter().find(|meal| self.qualifies(meal)) {
                info!("Starting round with '{}' after {} attempt(s)", meal.name(), attempt);
                return Ok(PuzzleState::from_meal(meal, &mut rand::thread_rng()));
            }
        }

        Err(PuzzleError::NoQualifyingCandidate {
            attempts: self.max_attempts,
        })
    }
}
