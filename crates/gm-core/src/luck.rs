//! Luck tokens: one-shot rerolls that keep the better result

use tracing::debug;

use crate::combatant::Combatant;
use crate::dice::{RollResult, roll_dice};
use crate::rng::RandomSource;

/// Chance to spend a token when the framing is critical
pub const CRITICAL_CHANCE: u32 = 75;

/// Percent chance to spend a token on a roll with this many net successes
pub const fn reroll_chance(net_successes: i32) -> u32 {
    match net_successes {
        i32::MIN..=-3 => 100,
        -2 => 50,
        -1 => 40,
        0 => 25,
        _ => 0,
    }
}

/// Decide whether a combatant should spend a token on this roll.
///
/// Positive rolls are never rerolled. In critical framing the chance is at
/// least [`CRITICAL_CHANCE`].
pub fn should_use_luck_token(net_successes: i32, critical: bool, rng: &mut dyn RandomSource) -> bool {
    let mut chance = reroll_chance(net_successes);
    if chance == 0 {
        return false;
    }
    if critical {
        chance = chance.max(CRITICAL_CHANCE);
    }
    chance >= 100 || rng.percent(chance)
}

/// Result of a luck-token reroll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuckOutcome {
    /// A token was spent
    pub success: bool,
    /// The better of the original and the reroll
    pub roll: RollResult,
    /// The reroll itself, if one happened
    pub reroll: Option<RollResult>,
}

/// Spend one token and reroll `dice` dice, keeping the better result.
///
/// With no tokens left this is a no-op returning the original roll.
pub fn use_luck_token(
    combatant: &mut Combatant,
    original: &RollResult,
    dice: u32,
    rng: &mut dyn RandomSource,
) -> LuckOutcome {
    if combatant.luck_tokens == 0 {
        return LuckOutcome {
            success: false,
            roll: original.clone(),
            reroll: None,
        };
    }
    combatant.luck_tokens -= 1;
    let reroll = roll_dice(dice as i32, rng);
    debug!(
        combatant = %combatant.id,
        original = original.net_successes,
        reroll = reroll.net_successes,
        tokens_left = combatant.luck_tokens,
        "luck token spent"
    );
    let roll = if reroll.net_successes > original.net_successes {
        reroll.clone()
    } else {
        original.clone()
    };
    LuckOutcome {
        success: true,
        roll,
        reroll: Some(reroll),
    }
}

/// Tokens awarded for defeating a combatant with this base stat total.
///
/// Weaker victims give more: `max(1, floor((600 - bst) / 80) + 1)`.
pub fn defeat_reward(base_stat_total: u32) -> u32 {
    let steps = (600 - base_stat_total as i64).div_euclid(80) + 1;
    steps.max(1) as u32
}

/// Add tokens, honouring an optional cap. Returns tokens actually added.
pub fn award_tokens(combatant: &mut Combatant, amount: u32, cap: Option<u32>) -> u32 {
    let before = combatant.luck_tokens;
    let mut after = before.saturating_add(amount);
    if let Some(cap) = cap {
        after = after.min(cap.max(before));
    }
    combatant.luck_tokens = after;
    after - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::CombatantId;
    use crate::rng::{GameRng, ScriptedRng};
    use crate::types::ElementType;

    fn lucky(tokens: u32) -> Combatant {
        Combatant::new(CombatantId(0), 0, "Lucky", &[ElementType::Normal]).with_luck(tokens)
    }

    #[test]
    fn test_reroll_table() {
        assert_eq!(reroll_chance(-5), 100);
        assert_eq!(reroll_chance(-3), 100);
        assert_eq!(reroll_chance(-2), 50);
        assert_eq!(reroll_chance(-1), 40);
        assert_eq!(reroll_chance(0), 25);
        assert_eq!(reroll_chance(1), 0);
    }

    #[test]
    fn test_should_use_draws() {
        let mut rng = ScriptedRng::new([]);
        assert!(should_use_luck_token(-4, false, &mut rng));
        assert!(!should_use_luck_token(2, true, &mut rng));
        assert_eq!(rng.remaining(), 0);

        rng.push(60);
        assert!(!should_use_luck_token(-2, false, &mut rng));
        rng.push(60);
        assert!(should_use_luck_token(-2, true, &mut rng));
    }

    #[test]
    fn test_keeps_better_roll() {
        let mut c = lucky(1);
        let original = RollResult::from_faces(vec![1, 1, 2]);
        let mut rng = ScriptedRng::new([]);
        rng.faces(&[6, 5, 3]);
        let outcome = use_luck_token(&mut c, &original, 3, &mut rng);
        assert!(outcome.success);
        assert_eq!(outcome.roll.net_successes, 2);
        assert_eq!(c.luck_tokens, 0);
    }

    #[test]
    fn test_worse_reroll_keeps_original() {
        let mut c = lucky(2);
        let original = RollResult::from_faces(vec![4, 2]);
        let mut rng = ScriptedRng::new([]);
        rng.faces(&[1, 1]);
        let outcome = use_luck_token(&mut c, &original, 2, &mut rng);
        assert!(outcome.success);
        assert_eq!(outcome.roll, original);
        assert_eq!(outcome.reroll.map(|r| r.net_successes), Some(-2));
        assert_eq!(c.luck_tokens, 1);
    }

    #[test]
    fn test_no_tokens_is_noop() {
        let mut c = lucky(0);
        let original = RollResult::from_faces(vec![1]);
        let mut rng = GameRng::new(5);
        let outcome = use_luck_token(&mut c, &original, 1, &mut rng);
        assert!(!outcome.success);
        assert_eq!(outcome.roll, original);
    }

    #[test]
    fn test_defeat_reward_scale() {
        assert_eq!(defeat_reward(200), 6);
        assert_eq!(defeat_reward(520), 2);
        assert_eq!(defeat_reward(600), 1);
        assert_eq!(defeat_reward(680), 1);
        assert_eq!(defeat_reward(720), 1);
    }

    #[test]
    fn test_award_respects_cap() {
        let mut c = lucky(2);
        assert_eq!(award_tokens(&mut c, 5, Some(4)), 2);
        assert_eq!(c.luck_tokens, 4);
        assert_eq!(award_tokens(&mut c, 3, None), 3);
    }
}
