//! Spaced-repetition scheduler.
//!
//! A fixed-interval policy: the rating alone decides the next interval.
//! Ease moves by at most one step per rating and stays within
//! [`MIN_EASE`]..=[`MAX_EASE`].

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::model::{Rating, SpacedRepetitionCard, MAX_EASE, MIN_EASE};

/// Interval in days assigned by a rating.
pub fn interval_for(rating: Rating) -> u32 {
    match rating {
        Rating::Again => 0,
        Rating::Hard => 1,
        Rating::Good => 3,
        Rating::Easy => 7,
    }
}

fn ease_after(ease: u8, rating: Rating) -> u8 {
    let ease = ease.clamp(MIN_EASE, MAX_EASE);
    match rating {
        Rating::Again => ease.saturating_sub(1).max(MIN_EASE),
        Rating::Hard | Rating::Good => ease,
        Rating::Easy => (ease + 1).min(MAX_EASE),
    }
}

/// Apply a rating at `now`. The previous schedule is overwritten.
pub fn rate(card: &mut SpacedRepetitionCard, rating: Rating, now: DateTime<Utc>) {
    card.ease = ease_after(card.ease, rating);
    card.interval_days = interval_for(rating);
    card.last_reviewed = Some(now);
    tracing::debug!(
        card = %card.id,
        %rating,
        ease = card.ease,
        interval_days = card.interval_days,
        "card rated"
    );
}

/// Intervals each rating would produce, for rating-button hints.
pub fn preview_intervals() -> [(Rating, u32); 4] {
    Rating::ALL.map(|r| (r, interval_for(r)))
}

/// Human-readable interval hint ("<1 min", "1 day", "3 days").
pub fn interval_label(days: u32) -> String {
    match days {
        0 => "<1 min".to_string(),
        1 => "1 day".to_string(),
        n => format!("{n} days"),
    }
}

/// Indexes of cards due at `now`, in deck order.
pub fn due_cards(cards: &[SpacedRepetitionCard], now: DateTime<Utc>) -> Vec<usize> {
    cards
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_due(now))
        .map(|(i, _)| i)
        .collect()
}

/// A single pass over the due cards of a deck.
///
/// The queue holds indexes into the deck the session was started from. A card
/// rated `Again` goes to the back of the queue so it comes round again before
/// the session ends.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    queue: VecDeque<usize>,
    reviewed: usize,
    requeued: usize,
    exited: bool,
}

impl ReviewSession {
    pub fn start<R: Rng + ?Sized>(
        cards: &[SpacedRepetitionCard],
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Self {
        let mut due = due_cards(cards, now);
        due.shuffle(rng);
        Self {
            queue: due.into(),
            reviewed: 0,
            requeued: 0,
            exited: false,
        }
    }

    /// Index of the card to show next, or `None` when the session is over.
    pub fn current(&self) -> Option<usize> {
        if self.exited {
            None
        } else {
            self.queue.front().copied()
        }
    }

    /// Rate the current card. Returns the index that was rated.
    pub fn rate_current(
        &mut self,
        cards: &mut [SpacedRepetitionCard],
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Option<usize> {
        if self.exited {
            return None;
        }
        let idx = *self.queue.front()?;
        let card = cards.get_mut(idx)?;
        self.queue.pop_front();
        rate(card, rating, now);
        self.reviewed += 1;
        if rating == Rating::Again {
            self.queue.push_back(idx);
            self.requeued += 1;
        }
        Some(idx)
    }

    /// Leave the session; remaining cards stay due.
    pub fn exit(&mut self) {
        self.exited = true;
    }

    pub fn is_finished(&self) -> bool {
        self.exited || self.queue.is_empty()
    }

    pub fn remaining(&self) -> usize {
        if self.exited {
            0
        } else {
            self.queue.len()
        }
    }

    /// Number of ratings given, including repeats.
    pub fn reviewed(&self) -> usize {
        self.reviewed
    }

    pub fn requeued(&self) -> usize {
        self.requeued
    }
}
