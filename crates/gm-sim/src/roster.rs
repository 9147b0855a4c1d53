//! Roster files and team placement

use std::path::Path;

use anyhow::{Context, bail};
use serde::Deserialize;

use gm_core::pathfinding::can_occupy;
use gm_core::terrain::DEPLOY_COLUMNS;
use gm_core::{BattleSession, CombatantId, CombatantTemplate};

/// `{ "teams": [[template, ...], [template, ...]] }`
#[derive(Debug, Deserialize)]
pub struct Roster {
    pub teams: Vec<Vec<CombatantTemplate>>,
}

impl Roster {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading roster {}", path.display()))?;
        let roster: Roster = serde_json::from_str(&text)
            .with_context(|| format!("parsing roster {}", path.display()))?;
        if roster.teams.len() < 2 {
            bail!("a battle needs at least two teams, roster has {}", roster.teams.len());
        }
        Ok(roster)
    }
}

/// Deployment columns for a team: even teams on the left edge, odd on the right
fn deploy_columns(team: usize, width: usize) -> Vec<i32> {
    let cols = DEPLOY_COLUMNS.min(width);
    if team % 2 == 0 {
        (0..cols as i32).collect()
    } else {
        (width.saturating_sub(cols)..width).rev().map(|x| x as i32).collect()
    }
}

/// Place every team on its deployment columns, first free tile top to bottom
pub fn deploy(session: &mut BattleSession, roster: &Roster) -> anyhow::Result<Vec<CombatantId>> {
    let width = session.grid().width();
    let height = session.grid().height() as i32;
    let mut placed = Vec::new();

    for (team, members) in roster.teams.iter().enumerate() {
        let team_id = u8::try_from(team).context("too many teams")?;
        for template in members {
            let size = template.size.unwrap_or(1);
            let spot = deploy_columns(team, width).into_iter().find_map(|x| {
                (0..height)
                    .find(|&y| can_occupy(session.grid(), session.combatants(), x, y, size, &[]))
                    .map(|y| (x, y))
            });
            let Some(pos) = spot else {
                bail!("no room to deploy {} for team {team}", template.species);
            };
            placed.push(session.add_from_template(template, team_id, pos));
        }
    }
    Ok(placed)
}

/// Turn order: fastest first, ties by join order
pub fn initiative(session: &BattleSession, ids: &[CombatantId]) -> Vec<CombatantId> {
    let mut order = ids.to_vec();
    order.sort_by_key(|id| {
        let speed = session.combatant(*id).map_or(0, |c| c.stats.speed);
        (std::cmp::Reverse(speed), *id)
    });
    order
}
