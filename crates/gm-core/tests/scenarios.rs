//! End-to-end battle scenarios driven through the public API

use gm_core::combatant::{BaseStats, Combatant, CombatantId, Strategy};
use gm_core::config::BattleConfig;
use gm_core::moves::{Attack, MoveBehavior, MoveCategory};
use gm_core::movement::{HaltReason, walk_path};
use gm_core::pathfinding::find_reachable;
use gm_core::pipeline::{RollKind, resolve_attack};
use gm_core::reaction::try_reaction;
use gm_core::rng::{GameRng, ScriptedRng};
use gm_core::session::BattleSession;
use gm_core::status::StatusKind;
use gm_core::terrain::{Terrain, TerrainGrid, path_weight};
use gm_core::types::ElementType;

const A: CombatantId = CombatantId(0);
const B: CombatantId = CombatantId(1);

fn tackle() -> Attack {
    Attack::damaging("Tackle", ElementType::Normal, MoveCategory::Physical, 40, 1)
}

fn duelist(team: u8, name: &str, x: i32) -> Combatant {
    Combatant::new(CombatantId(0), team, name, &[ElementType::Normal])
        .with_stats(BaseStats::uniform(50))
        .with_hp(100, 100)
        .at(x, 0)
}

fn duel(attacker: Combatant, defender: Combatant, rng: ScriptedRng) -> BattleSession {
    let mut session = BattleSession::new(
        TerrainGrid::new(4, 1, Terrain::Grass),
        BattleConfig::default(),
        rng,
    );
    session.add_combatant(attacker);
    session.add_combatant(defender);
    session
}

#[tokio::test]
async fn test_five_dice_hit_through_two_dice_dodge() {
    let mut rng = ScriptedRng::new([]);
    // accuracy: three successes, two neutrals; dodge: one success, one neutral
    rng.faces(&[4, 5, 6, 2, 3]).faces(&[6, 2]);
    let mut session = duel(
        duelist(0, "A", 0).with_skills(5, 0).with_attack(tackle()),
        duelist(1, "B", 1).with_skills(0, 2),
        rng,
    );

    let outcome = resolve_attack(&mut session, A, B, 0).await;

    assert_eq!(outcome.roll(RollKind::Accuracy).unwrap().dice(), 5);
    assert_eq!(outcome.roll(RollKind::Dodge).unwrap().dice(), 2);
    assert!(outcome.success);
    assert!(outcome.dodge_attempted);
    assert!(!outcome.reaction_triggered());
    // positive dodge: no botch bonus
    assert_eq!(outcome.net_successes, 3);
    assert_eq!(session.combatants()[1].hp, 100 - outcome.damage);
}

#[tokio::test]
async fn test_luck_token_turns_failing_dodge_around() {
    let mut rng = ScriptedRng::new([]);
    rng.faces(&[4, 5, 6, 2, 3])
        .faces(&[1, 1])
        .pass()
        .faces(&[5, 3]);
    let mut session = duel(
        duelist(0, "A", 0).with_skills(5, 0).with_attack(tackle()),
        duelist(1, "B", 1).with_skills(0, 2).with_luck(1),
        rng,
    );

    let outcome = resolve_attack(&mut session, A, B, 0).await;

    assert_eq!(outcome.roll(RollKind::Dodge).unwrap().net_successes, -2);
    assert_eq!(outcome.roll(RollKind::DodgeReroll).unwrap().net_successes, 1);
    assert_eq!(session.combatants()[1].luck_tokens, 0);
    // +1 still loses to 3, and the kept roll is not negative
    assert!(outcome.success);
    assert_eq!(outcome.net_successes, 3);
}

#[tokio::test]
async fn test_reinforcing_reaction_rate_is_about_half() {
    let curl = Attack::damaging("Defense Curl", ElementType::Normal, MoveCategory::Status, 0, 1)
        .with_behavior(MoveBehavior::SelfCurl)
        .as_reaction();
    let mut session = duel(
        duelist(0, "A", 0).with_attack(tackle()),
        duelist(1, "B", 1)
            .with_attack(curl)
            .with_strategy(Strategy::Reinforcing),
        ScriptedRng::new([]),
    );
    session.replace_rng(GameRng::new(2024));

    const TRIALS: u32 = 10_000;
    let mut fired = 0;
    for _ in 0..TRIALS {
        if try_reaction(&mut session, B, A, &tackle()).await.is_some() {
            fired += 1;
        }
        session.wait_for_all_reactions().await;
    }
    let rate = fired as f64 / TRIALS as f64;
    assert!((0.48..=0.52).contains(&rate), "reaction rate {rate}");
}

fn wader(hp: u32) -> Combatant {
    Combatant::new(CombatantId(0), 0, "Wader", &[ElementType::Normal])
        .with_hp(hp, hp)
        .at(0, 0)
}

#[tokio::test]
async fn test_water_damage_does_not_stop_a_surviving_walker() {
    let mut rng = ScriptedRng::new([]);
    rng.faces(&[3, 4]);
    let grid = TerrainGrid::from_rows(&[".~~."]).unwrap();
    let mut session = BattleSession::new(grid, BattleConfig::default(), rng);
    let id = session.add_combatant(wader(10));

    let report = walk_path(&mut session, id, &[(1, 0), (2, 0), (3, 0)]).await.unwrap();

    assert_eq!(report.steps, vec![(1, 0), (2, 0), (3, 0)]);
    assert_eq!(report.damage_taken, 7);
    assert_eq!(report.halted, None);
    assert_eq!(session.combatants()[0].hp, 3);
}

#[tokio::test]
async fn test_water_damage_halts_walk_at_zero_hp() {
    let mut rng = ScriptedRng::new([]);
    rng.faces(&[6, 6, 6]);
    let grid = TerrainGrid::from_rows(&[".~~~"]).unwrap();
    let mut session = BattleSession::new(grid, BattleConfig::default(), rng);
    let id = session.add_combatant(wader(10));

    let report = walk_path(&mut session, id, &[(1, 0), (2, 0), (3, 0)]).await.unwrap();

    assert_eq!(report.steps, vec![(1, 0), (2, 0)]);
    assert_eq!(report.halted, Some(HaltReason::Defeated));
    assert!(session.combatants()[0].is_defeated());
    assert_eq!(session.combatants()[0].hp, 0);
}

#[tokio::test]
async fn test_fire_type_crosses_lava_unburned() {
    let mut rng = ScriptedRng::new([]);
    // would burn anything that rolled
    rng.pass().pass().pass();
    let grid = TerrainGrid::from_rows(&[".!!!."]).unwrap();
    let mut session = BattleSession::new(grid, BattleConfig::default(), rng);
    let id = session.add_combatant(
        Combatant::new(CombatantId(0), 0, "Salamander", &[ElementType::Fire])
            .with_movement(8)
            .at(0, 0),
    );

    let salamander = &session.combatants()[0];
    assert_eq!(path_weight(Terrain::Lava, salamander), 0.1);
    let tiles = find_reachable(session.grid(), session.combatants(), (0, 0), 8, salamander, id);
    let across = tiles.iter().find(|t| (t.x, t.y) == (3, 0)).unwrap();
    assert!((across.total_weight - 0.3).abs() < 1e-5);

    let report = walk_path(&mut session, id, &[(1, 0), (2, 0), (3, 0)]).await.unwrap();
    assert_eq!(report.steps.len(), 3);
    assert!(report.statuses_gained.is_empty());
    assert!(!session.combatants()[0].statuses.has(StatusKind::Burned));
}

#[tokio::test]
async fn test_non_fire_walker_can_be_burned_by_lava() {
    let mut rng = ScriptedRng::new([]);
    rng.pass();
    let grid = TerrainGrid::from_rows(&[".!."]).unwrap();
    let mut session = BattleSession::new(grid, BattleConfig::default(), rng);
    let id = session.add_combatant(wader(40));

    let report = walk_path(&mut session, id, &[(1, 0), (2, 0)]).await.unwrap();
    assert_eq!(report.statuses_gained, vec![StatusKind::Burned]);
}
