//! Property tests for battle invariants

use hashbrown::HashSet;
use proptest::prelude::*;

use gm_core::combatant::{BaseStats, Combatant, CombatantId};
use gm_core::config::BattleConfig;
use gm_core::dice::{RollResult, roll_dice};
use gm_core::luck::use_luck_token;
use gm_core::moves::{Attack, MoveBehavior, MoveCategory};
use gm_core::pathfinding::find_reachable;
use gm_core::pipeline::resolve_attack;
use gm_core::rng::GameRng;
use gm_core::session::BattleSession;
use gm_core::terrain::{Terrain, TerrainGrid};
use gm_core::types::ElementType;

fn mon(hp: u32, max_hp: u32) -> Combatant {
    Combatant::new(CombatantId(0), 0, "Mon", &[ElementType::Normal]).with_hp(hp, max_hp)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_damage_clamps_at_zero(max_hp in 1u32..500, lost in 0u32..500, damage in 0u32..1000) {
        let hp = max_hp.saturating_sub(lost).max(1);
        let mut c = mon(hp, max_hp);
        let applied = c.take_damage(damage);
        prop_assert_eq!(c.hp, hp.saturating_sub(damage));
        prop_assert_eq!(applied.dealt, damage.min(hp));
        prop_assert_eq!(applied.defeated_now, damage >= hp);
        prop_assert_eq!(c.is_defeated(), damage >= hp);
    }

    #[test]
    fn prop_heal_never_exceeds_max(max_hp in 1u32..500, lost in 0u32..500, amount in 0u32..1000) {
        let hp = max_hp.saturating_sub(lost).max(1);
        let mut c = mon(hp, max_hp);
        c.heal(amount);
        prop_assert!(c.hp <= c.max_hp);
        prop_assert_eq!(c.hp, (hp + amount).min(max_hp));
    }

    #[test]
    fn prop_defeat_happens_once(max_hp in 1u32..200, hits in prop::collection::vec(0u32..300, 1..8)) {
        let mut c = mon(max_hp, max_hp);
        c.take_damage(max_hp);
        prop_assert!(c.is_defeated());
        for hit in hits {
            let applied = c.take_damage(hit);
            prop_assert_eq!(applied.dealt, 0);
            prop_assert!(!applied.defeated_now);
            prop_assert_eq!(c.heal(hit), 0);
            prop_assert_eq!(c.hp, 0);
        }
        prop_assert!(!c.mark_defeated());
    }

    #[test]
    fn prop_luck_reroll_never_worse(seed in any::<u64>(), dice in 0u32..12) {
        let mut rng = GameRng::new(seed);
        let original: RollResult = roll_dice(dice as i32, &mut rng);
        let mut c = mon(10, 10).with_luck(1);
        let outcome = use_luck_token(&mut c, &original, dice, &mut rng);
        prop_assert!(outcome.success);
        prop_assert!(outcome.roll.net_successes >= original.net_successes);
        prop_assert_eq!(c.luck_tokens, 0);
    }

    #[test]
    fn prop_reachable_is_manhattan_ball(
        width in 1usize..10,
        height in 1usize..10,
        sx in 0usize..10,
        sy in 0usize..10,
        points in 0u32..7,
    ) {
        let (sx, sy) = ((sx % width) as i32, (sy % height) as i32);
        let grid = TerrainGrid::new(width, height, Terrain::Grass);
        let me = mon(10, 10).at(sx, sy);
        let tiles = find_reachable(&grid, std::slice::from_ref(&me), (sx, sy), points, &me, me.id);

        let found: HashSet<(i32, i32)> = tiles.iter().map(|t| (t.x, t.y)).collect();
        prop_assert_eq!(found.len(), tiles.len());
        let mut expected = HashSet::new();
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                if ((x - sx).abs() + (y - sy).abs()) as u32 <= points {
                    expected.insert((x, y));
                }
            }
        }
        prop_assert_eq!(found, expected);
        for t in &tiles {
            prop_assert_eq!(t.total_cost, t.path.len() as u32);
        }
    }

    #[test]
    fn prop_pp_only_goes_down(max_pp in 0u32..10, uses in 0usize..20) {
        let mut attack = Attack::damaging("Tackle", ElementType::Normal, MoveCategory::Physical, 40, 1)
            .with_pp(max_pp);
        let mut previous = max_pp;
        for _ in 0..uses {
            attack.consume();
            let now = attack.current_pp.unwrap();
            prop_assert!(now <= previous);
            previous = now;
        }
        prop_assert_eq!(previous, max_pp.saturating_sub(uses as u32));
        prop_assert_eq!(attack.is_usable(), previous > 0);
    }

    #[test]
    fn prop_dodge_and_reaction_are_exclusive(seed in any::<u64>(), accuracy in 0i32..8, dodge in 0i32..8) {
        let curl = Attack::damaging("Defense Curl", ElementType::Normal, MoveCategory::Status, 0, 1)
            .with_behavior(MoveBehavior::SelfCurl)
            .as_reaction();
        let mut session = BattleSession::new(
            TerrainGrid::new(3, 3, Terrain::Grass),
            BattleConfig::default(),
            GameRng::new(seed),
        );
        session.add_combatant(
            Combatant::new(CombatantId(0), 0, "A", &[ElementType::Normal])
                .with_stats(BaseStats::uniform(60))
                .with_skills(accuracy, 0)
                .with_luck(1)
                .with_attack(Attack::damaging("Tackle", ElementType::Normal, MoveCategory::Physical, 40, 1)),
        );
        session.add_combatant(
            Combatant::new(CombatantId(0), 1, "B", &[ElementType::Normal])
                .with_skills(0, dodge)
                .with_luck(1)
                .with_attack(curl)
                .at(1, 0),
        );

        let outcome = runtime().block_on(async {
            let outcome = resolve_attack(&mut session, CombatantId(0), CombatantId(1), 0).await;
            session.wait_for_all_reactions().await;
            outcome
        });

        prop_assert!(outcome.error.is_none());
        prop_assert!(!(outcome.dodge_attempted && outcome.reaction_triggered()));
        if !outcome.missed {
            prop_assert!(outcome.dodge_attempted ^ outcome.reaction_triggered());
        }
        if outcome.reaction_triggered() {
            prop_assert!(!outcome.dodged);
            prop_assert!(outcome.success);
        }
    }
}
