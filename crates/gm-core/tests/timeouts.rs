//! Presentation timeouts under paused tokio time

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use gm_core::combatant::{Combatant, CombatantId, TurnFlags};
use gm_core::config::BattleConfig;
use gm_core::moves::{Attack, MoveBehavior, MoveCategory};
use gm_core::pipeline::resolve_attack;
use gm_core::presenter::{Effect, Presenter};
use gm_core::rng::ScriptedRng;
use gm_core::sequencer::run_turn;
use gm_core::session::BattleSession;
use gm_core::terrain::{Terrain, TerrainGrid};
use gm_core::types::ElementType;

const A: CombatantId = CombatantId(0);
const B: CombatantId = CombatantId(1);

/// Reaction effects never finish; everything else plays instantly
struct StuckReactions;

#[async_trait]
impl Presenter for StuckReactions {
    async fn play_effect(&self, effect: Effect) {
        if matches!(effect, Effect::Reaction { .. }) {
            std::future::pending::<()>().await;
        }
    }
}

/// Every attack animation takes `delay`
struct SlowAttacks {
    delay: Duration,
}

#[async_trait]
impl Presenter for SlowAttacks {
    async fn play_effect(&self, effect: Effect) {
        if matches!(effect, Effect::AttackStart { .. }) {
            tokio::time::sleep(self.delay).await;
        }
    }
}

fn curl() -> Attack {
    Attack::damaging("Defense Curl", ElementType::Normal, MoveCategory::Status, 0, 1)
        .with_behavior(MoveBehavior::SelfCurl)
        .as_reaction()
}

fn session(presenter: Arc<dyn Presenter>, rng: ScriptedRng) -> BattleSession {
    let mut s = BattleSession::new(
        TerrainGrid::new(4, 4, Terrain::Grass),
        BattleConfig::default(),
        rng,
    )
    .with_presenter(presenter);
    s.add_combatant(
        Combatant::new(CombatantId(0), 0, "A", &[ElementType::Normal])
            .with_hp(100, 100)
            .with_skills(3, 0)
            .with_attack(Attack::damaging("Tackle", ElementType::Normal, MoveCategory::Physical, 40, 1))
            .at(0, 0),
    );
    s.add_combatant(
        Combatant::new(CombatantId(0), 1, "B", &[ElementType::Normal])
            .with_hp(100, 100)
            .with_skills(0, 0)
            .with_attack(curl())
            .at(1, 0),
    );
    s
}

fn reacting_script() -> ScriptedRng {
    let mut rng = ScriptedRng::new([]);
    // accuracy, reaction fires, curl picked
    rng.faces(&[6, 6, 6]).pass().push(0);
    rng
}

#[tokio::test(start_paused = true)]
async fn test_stuck_reaction_is_released_by_barrier() {
    let mut s = session(Arc::new(StuckReactions), reacting_script());
    let outcome = resolve_attack(&mut s, A, B, 0).await;
    assert!(outcome.reaction_triggered());
    assert_eq!(s.in_flight_count(), 1);

    s.set_flags(B, TurnFlags::REACTION_ACTIVE);
    let started = Instant::now();
    let settled = s.wait_for_all_reactions().await;
    let waited = started.elapsed();

    assert!(!settled);
    assert!(waited >= Duration::from_secs(5) && waited < Duration::from_secs(6));
    assert!(!s.has_flags(B, TurnFlags::REACTION_ACTIVE));
    assert_eq!(s.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_turn_completes_despite_stuck_reaction() {
    let mut s = session(Arc::new(StuckReactions), reacting_script());
    let report = run_turn(&mut s, A).await;
    assert!(report.action.as_ref().is_some_and(|a| a.reaction_triggered()));
    assert!(!report.reactions_settled);
    assert!(s.current_turn().is_none());
    assert!(!s.has_flags(A, TurnFlags::MOVEMENT_LOCKED));
}

#[tokio::test(start_paused = true)]
async fn test_slow_animation_warns_but_finishes() {
    let mut rng = ScriptedRng::new([]);
    rng.faces(&[6, 6, 6]);
    let mut s = session(
        Arc::new(SlowAttacks {
            delay: Duration::from_secs(12),
        }),
        rng,
    );
    s.get_mut(B).unwrap().attacks.clear();

    let started = Instant::now();
    let outcome = resolve_attack(&mut s, A, B, 0).await;
    assert!(!outcome.animation_forced);
    assert!(started.elapsed() >= Duration::from_secs(12));
    assert!(outcome.success);
}

#[tokio::test(start_paused = true)]
async fn test_hung_animation_is_forced_at_hard_limit() {
    let mut rng = ScriptedRng::new([]);
    rng.faces(&[6, 6, 6]);
    let mut s = session(
        Arc::new(SlowAttacks {
            delay: Duration::from_secs(3600),
        }),
        rng,
    );
    s.get_mut(B).unwrap().attacks.clear();

    let started = Instant::now();
    let outcome = resolve_attack(&mut s, A, B, 0).await;
    let waited = started.elapsed();

    assert!(outcome.animation_forced);
    assert!(waited >= Duration::from_secs(15) && waited < Duration::from_secs(16));
    // game state was settled before the animation
    assert!(outcome.success);
    assert!(s.combatants()[1].hp < 100);
    assert!(!s.has_flags(A, TurnFlags::MOVEMENT_LOCKED));
}
