use crate::config::{EngineConfig, ScoreWeights};
use crate::models::assignment::ScoreBreakdown;
use crate::models::bid::Bid;

const MAX_RATING: f64 = 5.0;

/// Lowest and highest amount among the candidates competing for one job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn from_amounts<I>(amounts: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        amounts.into_iter().fold(None, |range, amount| match range {
            None => Some(PriceRange {
                min: amount,
                max: amount,
            }),
            Some(PriceRange { min, max }) => Some(PriceRange {
                min: min.min(amount),
                max: max.max(amount),
            }),
        })
    }
}

/// Scores one bid that already passed the availability filter.
pub fn compute_score(
    bid: &Bid,
    prices: PriceRange,
    wins_in_window: usize,
    config: &EngineConfig,
) -> (f64, ScoreBreakdown) {
    let breakdown = ScoreBreakdown {
        rating_score: rating_score(bid.driver_rating_at_bid, config.neutral_rating),
        availability_score: 1.0,
        price_score: price_score(bid.bid_amount, prices),
        fairness_score: fairness_score(wins_in_window, config.max_jobs_per_window),
    };

    let score = weighted_score(&breakdown, &config.weights);
    (score, breakdown)
}

pub fn weighted_score(breakdown: &ScoreBreakdown, weights: &ScoreWeights) -> f64 {
    (breakdown.rating_score * weights.rating)
        + (breakdown.availability_score * weights.availability)
        + (breakdown.price_score * weights.price)
        + (breakdown.fairness_score * weights.fairness)
}

fn rating_score(rating: f64, neutral: f64) -> f64 {
    if rating <= 0.0 {
        return neutral;
    }

    (rating / MAX_RATING).clamp(0.0, 1.0)
}

fn price_score(amount: f64, prices: PriceRange) -> f64 {
    if prices.max <= prices.min {
        return 1.0;
    }

    let spread = (prices.max - prices.min).max(1.0);
    (1.0 - (amount - prices.min) / spread).clamp(0.0, 1.0)
}

fn fairness_score(wins_in_window: usize, cap: usize) -> f64 {
    if cap == 0 {
        return 0.0;
    }

    (1.0 - wins_in_window as f64 / cap as f64).clamp(0.0, 1.0)
}
