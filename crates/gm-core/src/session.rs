//! Battle session context
//!
//! The session owns everything one battle needs: combatants, terrain, the
//! random source, the outbound seams and the handles of every effect still
//! playing. All gameplay mutation goes through `&mut BattleSession`, so
//! mutations are serialized by construction; only presentation runs detached.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::combatant::{Combatant, CombatantId, CombatantTemplate, TurnFlags};
use crate::config::BattleConfig;
use crate::error::{ActionError, ActionResult};
use crate::presenter::{BattleLog, Effect, NullLog, NullPresenter, Presenter};
use crate::rng::{GameRng, RandomSource};
use crate::sequencer::TurnContext;
use crate::terrain::TerrainGrid;
use crate::weather::Weather;

/// How an effect is played relative to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presentation {
    /// Await completion before game logic resumes
    #[default]
    Inline,
    /// Spawn and track in the in-flight registry
    Detached,
}

/// A detached effect still playing
#[derive(Debug)]
struct InFlight {
    owner: CombatantId,
    handle: JoinHandle<()>,
}

/// Flags cleared when everything in flight is force-completed
const TRANSIENT_FLAGS: TurnFlags = TurnFlags::MOVEMENT_LOCKED
    .union(TurnFlags::DODGING)
    .union(TurnFlags::REACTION_ACTIVE)
    .union(TurnFlags::CURLED);

pub struct BattleSession {
    pub(crate) combatants: Vec<Combatant>,
    pub(crate) grid: TerrainGrid,
    pub(crate) config: BattleConfig,
    pub(crate) rng: Box<dyn RandomSource>,
    pub weather: Weather,
    presenter: Arc<dyn Presenter>,
    log: Arc<dyn BattleLog>,
    in_flight: Vec<InFlight>,
    pub(crate) turn: Option<TurnContext>,
}

impl std::fmt::Debug for BattleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleSession")
            .field("combatants", &self.combatants.len())
            .field("weather", &self.weather)
            .field("in_flight", &self.in_flight.len())
            .field("turn", &self.turn)
            .finish()
    }
}

impl BattleSession {
    /// Create an empty session
    pub fn new(grid: TerrainGrid, config: BattleConfig, rng: impl RandomSource + 'static) -> Self {
        Self {
            combatants: Vec::new(),
            grid,
            config,
            rng: Box::new(rng),
            weather: Weather::Clear,
            presenter: Arc::new(NullPresenter),
            log: Arc::new(NullLog),
            in_flight: Vec::new(),
            turn: None,
        }
    }

    /// Session with default config and a seeded RNG
    pub fn seeded(grid: TerrainGrid, seed: u64) -> Self {
        Self::new(grid, BattleConfig::default(), GameRng::new(seed))
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn with_log(mut self, log: Arc<dyn BattleLog>) -> Self {
        self.log = log;
        self
    }

    pub fn with_weather(mut self, weather: Weather) -> Self {
        self.weather = weather;
        self
    }

    /// Swap the random source
    pub fn replace_rng(&mut self, rng: impl RandomSource + 'static) {
        self.rng = Box::new(rng);
    }

    // ------------------------------------------------------------------
    // Combatants
    // ------------------------------------------------------------------

    /// Add a combatant; its id becomes its index
    pub fn add_combatant(&mut self, mut combatant: Combatant) -> CombatantId {
        let id = CombatantId(self.combatants.len() as u32);
        combatant.id = id;
        debug!(id = %id, species = %combatant.species, team = combatant.team, "combatant joined");
        self.combatants.push(combatant);
        id
    }

    /// Normalize a roster template and add it
    pub fn add_from_template(
        &mut self,
        template: &CombatantTemplate,
        team: u8,
        pos: (i32, i32),
    ) -> CombatantId {
        let id = CombatantId(self.combatants.len() as u32);
        self.add_combatant(Combatant::from_template(id, team, template, pos))
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.get(id.index())
    }

    pub fn combatant_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.combatants.get_mut(id.index())
    }

    pub fn get(&self, id: CombatantId) -> ActionResult<&Combatant> {
        self.combatant(id).ok_or(ActionError::UnknownCombatant(id))
    }

    pub fn get_mut(&mut self, id: CombatantId) -> ActionResult<&mut Combatant> {
        self.combatant_mut(id).ok_or(ActionError::UnknownCombatant(id))
    }

    /// Fails if the combatant's footprint centre is off the grid
    pub fn check_position(&self, id: CombatantId) -> ActionResult<()> {
        let c = self.get(id)?;
        if self.grid.in_bounds(c.x, c.y) {
            Ok(())
        } else {
            Err(ActionError::MissingPosition(id))
        }
    }

    pub fn grid(&self) -> &TerrainGrid {
        &self.grid
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn rng_mut(&mut self) -> &mut dyn RandomSource {
        self.rng.as_mut()
    }

    /// Borrow one combatant and the random source together
    pub(crate) fn combatant_and_rng(
        &mut self,
        id: CombatantId,
    ) -> ActionResult<(&mut Combatant, &mut dyn RandomSource)> {
        let combatant = self
            .combatants
            .get_mut(id.index())
            .ok_or(ActionError::UnknownCombatant(id))?;
        Ok((combatant, self.rng.as_mut()))
    }

    /// Teams that still have a living combatant, ascending
    pub fn living_teams(&self) -> Vec<u8> {
        let mut teams: Vec<u8> = self
            .combatants
            .iter()
            .filter(|c| c.is_alive())
            .map(|c| c.team)
            .collect();
        teams.sort_unstable();
        teams.dedup();
        teams
    }

    /// Whose turn it is and in which phase, while a turn runs
    pub fn current_turn(&self) -> Option<&TurnContext> {
        self.turn.as_ref()
    }

    /// At most one team left standing
    pub fn is_over(&self) -> bool {
        self.living_teams().len() <= 1
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    pub fn set_flags(&mut self, id: CombatantId, flags: TurnFlags) {
        if let Some(c) = self.combatant_mut(id) {
            c.flags.insert(flags);
        }
    }

    pub fn clear_flags(&mut self, id: CombatantId, flags: TurnFlags) {
        if let Some(c) = self.combatant_mut(id) {
            c.flags.remove(flags);
        }
    }

    pub fn has_flags(&self, id: CombatantId, flags: TurnFlags) -> bool {
        self.combatant(id).is_some_and(|c| c.flags.contains(flags))
    }

    // ------------------------------------------------------------------
    // Outbound seams
    // ------------------------------------------------------------------

    /// Send a message to the battle log
    pub fn log_event(&self, message: &str) {
        trace!(text = message, "battle log");
        self.log.log_event(message);
    }

    /// Play one effect
    pub async fn present(&mut self, owner: CombatantId, effect: Effect, mode: Presentation) {
        self.play_sequence(owner, vec![effect], mode).await;
    }

    /// Play effects in order.
    ///
    /// Inline sequences are bounded by the attack timeouts: a warning at the
    /// soft limit, forced completion at the hard limit. Returns false if the
    /// sequence was forced.
    pub async fn play_sequence(
        &mut self,
        owner: CombatantId,
        effects: Vec<Effect>,
        mode: Presentation,
    ) -> bool {
        if effects.is_empty() {
            return true;
        }
        let presenter = Arc::clone(&self.presenter);
        let sequence = async move {
            for effect in effects {
                presenter.play_effect(effect).await;
            }
        };
        match mode {
            Presentation::Inline => self.run_timed(owner, sequence).await,
            Presentation::Detached => {
                self.in_flight.retain(|f| !f.handle.is_finished());
                let handle = tokio::spawn(sequence);
                self.in_flight.push(InFlight { owner, handle });
                true
            }
        }
    }

    async fn run_timed<F>(&self, owner: CombatantId, sequence: F) -> bool
    where
        F: Future<Output = ()>,
    {
        let soft = self.config.attack_soft_timeout();
        let hard = self.config.attack_hard_timeout();
        let mut sequence = std::pin::pin!(sequence);
        if timeout(soft, sequence.as_mut()).await.is_ok() {
            return true;
        }
        warn!(combatant = %owner, soft_ms = self.config.attack_soft_timeout_ms, "effect still playing past soft timeout");
        if timeout(hard.saturating_sub(soft), sequence).await.is_ok() {
            return true;
        }
        warn!(combatant = %owner, hard_ms = self.config.attack_hard_timeout_ms, "effect timed out, forcing completion");
        false
    }

    /// Pause between movement steps
    pub async fn pace(&self) {
        let delay = self.config.step_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    // ------------------------------------------------------------------
    // In-flight registry
    // ------------------------------------------------------------------

    /// Detached effects not yet known to be finished
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .iter()
            .filter(|f| !f.handle.is_finished())
            .count()
    }

    /// Wait for every detached reaction effect, bounded by the reaction
    /// timeout. Stuck reactions are aborted and their flags cleared.
    ///
    /// Returns true if everything finished in time.
    pub async fn wait_for_all_reactions(&mut self) -> bool {
        if self.in_flight.is_empty() {
            return true;
        }
        let pending = std::mem::take(&mut self.in_flight);
        let owners: Vec<CombatantId> = pending.iter().map(|f| f.owner).collect();
        let aborts: Vec<_> = pending.iter().map(|f| f.handle.abort_handle()).collect();
        let handles = pending.into_iter().map(|f| f.handle);

        match timeout(self.config.reaction_timeout(), join_all(handles)).await {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    pending = aborts.len(),
                    timeout_ms = self.config.reaction_timeout_ms,
                    "reactions did not finish in time, force-clearing"
                );
                for abort in aborts {
                    abort.abort();
                }
                for owner in owners {
                    self.clear_flags(owner, TurnFlags::REACTION_ACTIVE | TurnFlags::DODGING);
                }
                false
            }
        }
    }

    /// Abort everything in flight and release every lock
    pub fn force_complete_all(&mut self) {
        let aborted = self.in_flight.len();
        for f in self.in_flight.drain(..) {
            f.handle.abort();
        }
        for c in &mut self.combatants {
            c.flags.remove(TRANSIENT_FLAGS);
        }
        if aborted > 0 {
            warn!(aborted, "force-completed in-flight effects");
        }
    }

    /// Back to battle-start state: full HP/PP, no statuses, nothing in flight
    pub fn reset(&mut self) {
        self.force_complete_all();
        self.turn = None;
        for c in &mut self.combatants {
            c.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::{MemoryLog, RecordingPresenter};
    use crate::terrain::Terrain;
    use crate::types::ElementType;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Presenter whose effects never finish
    struct StuckPresenter;

    #[async_trait]
    impl Presenter for StuckPresenter {
        async fn play_effect(&self, _effect: Effect) {
            std::future::pending::<()>().await;
        }
    }

    fn session() -> BattleSession {
        let mut s = BattleSession::seeded(TerrainGrid::new(6, 6, Terrain::Grass), 1);
        s.add_combatant(Combatant::new(CombatantId(0), 0, "A", &[ElementType::Normal]).at(0, 0));
        s.add_combatant(Combatant::new(CombatantId(0), 1, "B", &[ElementType::Normal]).at(3, 3));
        s
    }

    fn defeat(id: u32) -> Effect {
        Effect::Defeat {
            combatant: CombatantId(id),
        }
    }

    #[test]
    fn test_ids_follow_insertion_order() {
        let s = session();
        assert_eq!(s.combatants()[1].id, CombatantId(1));
        assert!(s.get(CombatantId(5)).is_err());
        assert_eq!(s.living_teams(), vec![0, 1]);
        assert!(!s.is_over());
    }

    #[test]
    fn test_missing_position() {
        let mut s = session();
        s.get_mut(CombatantId(1)).unwrap().x = 40;
        assert_eq!(
            s.check_position(CombatantId(1)),
            Err(ActionError::MissingPosition(CombatantId(1)))
        );
        assert!(s.check_position(CombatantId(0)).is_ok());
    }

    #[tokio::test]
    async fn test_inline_effects_reach_presenter() {
        let presenter = RecordingPresenter::new();
        let log = MemoryLog::new();
        let mut s = session().with_presenter(presenter.clone()).with_log(log.clone());
        s.present(CombatantId(0), defeat(1), Presentation::Inline).await;
        s.log_event("B fainted!");
        assert_eq!(presenter.effects(), vec![defeat(1)]);
        assert_eq!(log.lines(), vec!["B fainted!".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_effect_is_force_completed_at_hard_timeout() {
        let mut s = session().with_presenter(Arc::new(StuckPresenter));
        let start = tokio::time::Instant::now();
        let finished = s
            .play_sequence(CombatantId(0), vec![defeat(1)], Presentation::Inline)
            .await;
        assert!(!finished);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaction_barrier_times_out_and_clears_flags() {
        let mut s = session().with_presenter(Arc::new(StuckPresenter));
        s.set_flags(CombatantId(1), TurnFlags::REACTION_ACTIVE);
        s.present(CombatantId(1), defeat(0), Presentation::Detached).await;
        assert_eq!(s.in_flight_count(), 1);

        let start = tokio::time::Instant::now();
        assert!(!s.wait_for_all_reactions().await);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
        assert!(!s.has_flags(CombatantId(1), TurnFlags::REACTION_ACTIVE));
        assert_eq!(s.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_reaction_barrier_waits_for_detached_effects() {
        let presenter = RecordingPresenter::new();
        let mut s = session().with_presenter(presenter.clone());
        s.present(CombatantId(1), defeat(0), Presentation::Detached).await;
        assert!(s.wait_for_all_reactions().await);
        assert_eq!(presenter.effects(), vec![defeat(0)]);
    }

    #[tokio::test]
    async fn test_force_complete_releases_locks() {
        let mut s = session().with_presenter(Arc::new(StuckPresenter));
        s.set_flags(CombatantId(0), TurnFlags::MOVEMENT_LOCKED | TurnFlags::CURLED);
        s.present(CombatantId(0), defeat(1), Presentation::Detached).await;
        s.force_complete_all();
        assert_eq!(s.in_flight_count(), 0);
        assert!(s.combatants()[0].flags.is_empty());
    }

    #[test]
    fn test_reset_restores_battle_start_state() {
        let mut s = session();
        s.get_mut(CombatantId(1)).unwrap().take_damage(1_000);
        assert!(s.is_over());
        s.reset();
        assert!(s.combatants()[1].is_alive());
        assert_eq!(s.combatants()[1].hp, s.combatants()[1].max_hp);
    }
}
