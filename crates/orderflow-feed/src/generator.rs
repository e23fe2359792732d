//! Record generators.
//!
//! Every function is total: any `Rng` and any pair produce a valid record.
//! Batch generators draw ids from `generate_id`, so ids never repeat within
//! a batch or across batches.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};

use orderflow_core::{
    ActivityEvent, ActivityKind, Amount, ChatMessage, CurrencyPair, LeaderboardEntry, MarketRate,
    Notification, NotificationKind, Order, OrderOrigin, Rate,
};

use crate::format::format_number;
use crate::ids::generate_id;

/// Quotes stay within this many basis points of the pair baseline (±2%).
pub const MAX_RATE_DEVIATION_BPS: i64 = 200;

/// Smallest synthetic order amount.
pub const MIN_AMOUNT: f64 = 50.0;

/// Largest synthetic order amount.
pub const MAX_AMOUNT: f64 = 25_000.0;

const LEADERBOARD_MIN_VOLUME: f64 = 5_000.0;
const LEADERBOARD_MAX_VOLUME: f64 = 2_000_000.0;

const TRADER_NAMES: &[&str] = &[
    "satoshi_fan",
    "desert_whale",
    "mumbai_merchant",
    "lagos_otc",
    "nairobi_node",
    "euro_stable",
    "rio_settler",
    "dubai_desk",
    "quiet_maker",
    "gm_trader",
    "swiftpay",
    "lowfee_lena",
    "escrow_eddie",
    "bazaar_bot",
    "pesa_pro",
];

const MESSAGE_TEXTS: &[&str] = &[
    "Hi, is this order still available?",
    "Payment sent, please check your account.",
    "Can you do a slightly better rate?",
    "Thanks, smooth trade!",
    "I'll transfer within 10 minutes.",
    "Bank transfer or cash deposit?",
    "Escrow locked on my side.",
];

// ============================================================================
// Rates and amounts
// ============================================================================

/// All supported pairs.
pub fn get_currency_pairs() -> &'static [CurrencyPair] {
    &CurrencyPair::ALL
}

/// Random rate within ±2% of the pair baseline, 4 decimal places.
pub fn generate_rate<R: Rng + ?Sized>(rng: &mut R, pair: CurrencyPair) -> Rate {
    let bps = rng.gen_range(-MAX_RATE_DEVIATION_BPS..=MAX_RATE_DEVIATION_BPS);
    rate_at_bps(pair, bps)
}

/// Baseline shifted by `bps`, rounded to 4dp toward the baseline so the
/// rounded quote never leaves the band the shift stayed inside.
fn rate_at_bps(pair: CurrencyPair, bps: i64) -> Rate {
    let strategy = if bps >= 0 {
        RoundingStrategy::ToNegativeInfinity
    } else {
        RoundingStrategy::ToPositiveInfinity
    };
    let shifted = pair.baseline_rate().shifted_bps(bps);
    Rate::new(shifted.inner().round_dp_with_strategy(4, strategy))
}

/// Quote for `pair`, or for a random pair when `None`.
pub fn generate_market_rate<R: Rng + ?Sized>(
    rng: &mut R,
    pair: Option<CurrencyPair>,
) -> MarketRate {
    let pair = pair.unwrap_or_else(|| pick_pair(rng));
    MarketRate {
        pair,
        rate: generate_rate(rng, pair),
        as_of: Utc::now(),
    }
}

/// Log-uniform amount in `[MIN_AMOUNT, MAX_AMOUNT]`, rounded to cents.
///
/// Log-uniform keeps small retail tickets as common as large desk tickets.
pub fn generate_amount<R: Rng + ?Sized>(rng: &mut R) -> Amount {
    Amount::new(log_uniform_cents(rng, MIN_AMOUNT, MAX_AMOUNT))
}

fn log_uniform_cents<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> Decimal {
    let ln = rng.gen_range(min.ln()..=max.ln());
    let cents = (ln.exp() * 100.0).round() as i64;
    let cents = cents.clamp((min * 100.0) as i64, (max * 100.0) as i64);
    Decimal::new(cents, 2)
}

fn pick_pair<R: Rng + ?Sized>(rng: &mut R) -> CurrencyPair {
    *CurrencyPair::ALL
        .choose(rng)
        .unwrap_or(&CurrencyPair::UsdtAed)
}

fn pick_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    TRADER_NAMES.choose(rng).copied().unwrap_or("anon").to_string()
}

// ============================================================================
// Orders
// ============================================================================

/// Synthetic order quoted on the default pair.
pub fn generate_order<R: Rng + ?Sized>(rng: &mut R) -> Order {
    generate_order_for_pair(rng, CurrencyPair::default())
}

/// Synthetic order quoted on `pair`.
pub fn generate_order_for_pair<R: Rng + ?Sized>(rng: &mut R, pair: CurrencyPair) -> Order {
    Order {
        id: generate_id(),
        amount: generate_amount(rng),
        rate: generate_rate(rng, pair),
        timestamp: Utc::now(),
        origin: OrderOrigin::Synthetic,
        trader: Some(pick_name(rng)),
    }
}

pub fn generate_orders<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<Order> {
    (0..n).map(|_| generate_order(rng)).collect()
}

// ============================================================================
// Leaderboard
// ============================================================================

/// `n` leaderboard rows, sorted by volume with ranks assigned.
///
/// Names repeat with a numeric suffix once the built-in list runs out.
pub fn generate_leaderboard<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<LeaderboardEntry> {
    let mut names: Vec<&str> = TRADER_NAMES.to_vec();
    names.shuffle(rng);

    let mut entries: Vec<LeaderboardEntry> = (0..n)
        .map(|i| {
            let base = names[i % names.len()];
            let name = if i < names.len() {
                base.to_string()
            } else {
                format!("{base}_{}", i / names.len() + 1)
            };
            LeaderboardEntry {
                name,
                volume: log_uniform_cents(rng, LEADERBOARD_MIN_VOLUME, LEADERBOARD_MAX_VOLUME)
                    .trunc(),
                trades: rng.gen_range(12..2_500),
                rank: 0,
                rating: Decimal::new(rng.gen_range(40..=50), 1),
                online: rng.gen_bool(0.7),
            }
        })
        .collect();

    rank_entries(&mut entries);
    entries
}

/// Sort by volume descending and assign dense ranks `1..=n`.
///
/// The sort is stable, so equal volumes keep their previous relative order
/// and receive consecutive ranks in that order.
pub fn rank_entries(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(|a, b| b.volume.cmp(&a.volume));
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i as u32 + 1;
    }
}

// ============================================================================
// Notifications, messages, activity
// ============================================================================

pub fn generate_notification<R: Rng + ?Sized>(rng: &mut R) -> Notification {
    let kind = *[
        NotificationKind::OrderMatched,
        NotificationKind::EscrowLocked,
        NotificationKind::PaymentReceived,
        NotificationKind::RatingReceived,
        NotificationKind::PriceAlert,
    ]
    .choose(rng)
    .unwrap_or(&NotificationKind::OrderMatched);

    let amount = format_number(generate_amount(rng).inner());
    let who = pick_name(rng);
    let (title, body) = match kind {
        NotificationKind::OrderMatched => (
            "Order matched".to_string(),
            format!("{who} accepted your order for {amount} USDT"),
        ),
        NotificationKind::EscrowLocked => (
            "Escrow locked".to_string(),
            format!("{amount} USDT locked in escrow by {who}"),
        ),
        NotificationKind::PaymentReceived => (
            "Payment received".to_string(),
            format!("{who} marked fiat payment as sent"),
        ),
        NotificationKind::RatingReceived => (
            "New rating".to_string(),
            format!("{who} rated you {}/5", rng.gen_range(4..=5)),
        ),
        NotificationKind::PriceAlert => {
            let pair = pick_pair(rng);
            (
                "Price alert".to_string(),
                format!("{pair} moved to {}", generate_rate(rng, pair)),
            )
        }
    };

    Notification {
        id: generate_id(),
        kind,
        title,
        body,
        time: Utc::now(),
        read: false,
    }
}

pub fn generate_notifications<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<Notification> {
    (0..n).map(|_| generate_notification(rng)).collect()
}

pub fn generate_message<R: Rng + ?Sized>(rng: &mut R) -> ChatMessage {
    ChatMessage {
        id: generate_id(),
        from: pick_name(rng),
        text: MESSAGE_TEXTS
            .choose(rng)
            .copied()
            .unwrap_or("Hello")
            .to_string(),
        time: Utc::now(),
        read: false,
    }
}

pub fn generate_messages<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<ChatMessage> {
    (0..n).map(|_| generate_message(rng)).collect()
}

pub fn generate_activity<R: Rng + ?Sized>(rng: &mut R) -> ActivityEvent {
    let kind = *[
        ActivityKind::Trade,
        ActivityKind::Trade,
        ActivityKind::EscrowLocked,
        ActivityKind::EscrowReleased,
        ActivityKind::NewMerchant,
    ]
    .choose(rng)
    .unwrap_or(&ActivityKind::Trade);

    ActivityEvent {
        id: generate_id(),
        kind,
        actor: pick_name(rng),
        amount: generate_amount(rng),
        pair: pick_pair(rng),
        time: Utc::now(),
        read: false,
    }
}

pub fn generate_activities<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<ActivityEvent> {
    (0..n).map(|_| generate_activity(rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_order_batches_have_distinct_ids() {
        let mut rng = rng();
        let mut seen = HashSet::new();
        for _ in 0..20 {
            for order in generate_orders(&mut rng, 50) {
                assert!(seen.insert(order.id), "duplicate id across batches");
            }
        }
    }

    #[test]
    fn test_rates_stay_within_two_percent_of_baseline() {
        let mut rng = rng();
        for pair in get_currency_pairs() {
            let base = pair.baseline_rate();
            for _ in 0..200 {
                let rate = generate_rate(&mut rng, *pair);
                assert!(rate.is_positive());
                let bps = rate.bps_from(base).unwrap().abs();
                assert!(bps <= Decimal::from(200), "{pair}: {rate} is {bps} bps off");
            }
        }
    }

    #[test]
    fn test_band_edges_round_inside() {
        for pair in get_currency_pairs() {
            let base = pair.baseline_rate();
            for bps in [-MAX_RATE_DEVIATION_BPS, MAX_RATE_DEVIATION_BPS] {
                let rate = rate_at_bps(*pair, bps);
                assert!(rate.inner().scale() <= 4, "{pair}: {rate}");
                let off = rate.bps_from(base).unwrap().abs();
                assert!(off <= Decimal::from(200), "{pair}: {rate} is {off} bps off");
            }
        }
        // 3.6725 * 1.02 = 3.74595, which plain rounding takes to 3.7460
        assert_eq!(
            rate_at_bps(CurrencyPair::UsdtAed, MAX_RATE_DEVIATION_BPS).inner(),
            Decimal::new(37459, 4)
        );
    }

    #[test]
    fn test_amounts_within_bounds() {
        let mut rng = rng();
        let min = Decimal::new((MIN_AMOUNT * 100.0) as i64, 2);
        let max = Decimal::new((MAX_AMOUNT * 100.0) as i64, 2);
        for _ in 0..1_000 {
            let amount = generate_amount(&mut rng).inner();
            assert!(amount >= min && amount <= max, "{amount}");
            assert!(amount.scale() <= 2);
        }
    }

    #[test]
    fn test_market_rate_respects_requested_pair() {
        let mut rng = rng();
        let quote = generate_market_rate(&mut rng, Some(CurrencyPair::UsdtInr));
        assert_eq!(quote.pair, CurrencyPair::UsdtInr);
        let any = generate_market_rate(&mut rng, None);
        assert!(get_currency_pairs().contains(&any.pair));
    }

    #[test]
    fn test_synthetic_orders_are_marked() {
        let order = generate_order(&mut rng());
        assert_eq!(order.origin, OrderOrigin::Synthetic);
        assert!(order.trader.is_some());
    }

    #[test]
    fn test_leaderboard_sorted_with_dense_ranks() {
        let board = generate_leaderboard(&mut rng(), 25);
        assert_eq!(board.len(), 25);
        for pair in board.windows(2) {
            assert!(pair[0].volume >= pair[1].volume);
        }
        let ranks: Vec<u32> = board.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, (1..=25).collect::<Vec<u32>>());
        let names: HashSet<&str> = board.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names.len(), 25);
        for e in &board {
            assert!(e.rating >= Decimal::ZERO && e.rating <= Decimal::from(5));
        }
    }

    #[test]
    fn test_rank_entries_is_stable_on_ties() {
        let entry = |name: &str, volume: i64| LeaderboardEntry {
            name: name.to_string(),
            volume: Decimal::from(volume),
            trades: 1,
            rank: 0,
            rating: Decimal::from(5),
            online: true,
        };
        let mut entries = vec![entry("a", 10), entry("b", 20), entry("c", 10)];
        rank_entries(&mut entries);
        let order: Vec<(&str, u32)> = entries.iter().map(|e| (e.name.as_str(), e.rank)).collect();
        assert_eq!(order, vec![("b", 1), ("a", 2), ("c", 3)]);
    }

    #[test]
    fn test_event_batches() {
        let mut rng = rng();
        let notes = generate_notifications(&mut rng, 8);
        let msgs = generate_messages(&mut rng, 5);
        let acts = generate_activities(&mut rng, 5);
        assert_eq!(notes.len(), 8);
        assert_eq!(msgs.len(), 5);
        assert_eq!(acts.len(), 5);
        assert!(notes.iter().all(|n| !n.read && !n.title.is_empty()));
        assert!(msgs.iter().all(|m| !m.read));

        let ids: HashSet<_> = notes
            .iter()
            .map(|n| n.id.clone())
            .chain(msgs.iter().map(|m| m.id.clone()))
            .chain(acts.iter().map(|a| a.id.clone()))
            .collect();
        assert_eq!(ids.len(), 18);
    }
}
