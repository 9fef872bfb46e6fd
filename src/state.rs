use serde::Serialize;

use crate::map::{LayerDefinition, MapDefinition};
use crate::types::{
    manhattan, DeathReason, Direction, GameMode, Ghost, Item, OutcomeView, StatusView, TrailPoint,
    Vec2, Wall,
};
use crate::visibility;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayerState {
    pub x: i32,
    pub y: i32,
    pub layer: usize,
    pub hp: i32,
    pub stamina: i32,
    pub keys: i32,
    pub steps: i32,
    pub trail: Vec<TrailPoint>,
}

impl PlayerState {
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Per-layer dynamic sub-state. Wall grids start as copies of the
/// definition and only ever change through Locked->Empty conversion and
/// LetterDoor toggling.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayerState {
    #[serde(rename = "hWalls")]
    pub h_walls: Vec<Vec<Wall>>,
    #[serde(rename = "vWalls")]
    pub v_walls: Vec<Vec<Wall>>,
    pub ghosts: Vec<Ghost>,
    pub items: Vec<Item>,
    pub seen: Vec<Vec<bool>>,
}

impl LayerState {
    fn from_definition(def: &LayerDefinition, next_ghost_id: &mut u32) -> Self {
        let ghosts = def
            .ghosts
            .iter()
            .map(|pos| {
                let id = *next_ghost_id;
                *next_ghost_id += 1;
                Ghost {
                    x: pos.x,
                    y: pos.y,
                    id,
                    trail: Vec::new(),
                }
            })
            .collect();
        Self {
            h_walls: def.h_walls.clone(),
            v_walls: def.v_walls.clone(),
            ghosts,
            items: def.items.clone(),
            seen: def
                .active_cells
                .iter()
                .map(|row| vec![false; row.len()])
                .collect(),
        }
    }

    /// The wall crossed when stepping from `from` one cell along `dir`.
    /// `from` must be inside the grid.
    pub fn wall_between(&self, from: Vec2, dir: Direction) -> Wall {
        let x = from.x as usize;
        let y = from.y as usize;
        match dir {
            Direction::Up => self.h_walls[y][x],
            Direction::Down => self.h_walls[y + 1][x],
            Direction::Left => self.v_walls[y][x],
            Direction::Right => self.v_walls[y][x + 1],
        }
    }

    pub fn set_wall_between(&mut self, from: Vec2, dir: Direction, wall: Wall) {
        let x = from.x as usize;
        let y = from.y as usize;
        match dir {
            Direction::Up => self.h_walls[y][x] = wall,
            Direction::Down => self.h_walls[y + 1][x] = wall,
            Direction::Left => self.v_walls[y][x] = wall,
            Direction::Right => self.v_walls[y][x + 1] = wall,
        }
    }

    pub fn has_ghost_at(&self, pos: Vec2) -> bool {
        self.ghosts.iter().any(|g| g.pos() == pos)
    }

    pub fn is_seen(&self, pos: Vec2) -> bool {
        self.seen
            .get(pos.y as usize)
            .and_then(|row| row.get(pos.x as usize))
            .copied()
            .unwrap_or(false)
    }
}

/// Immutable dynamic snapshot of one simulation step. Every transition
/// produces a fresh deep copy; two states never share mutable substructure.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameState {
    pub player: PlayerState,
    #[serde(rename = "loopCount")]
    pub loop_count: i32,
    #[serde(rename = "isDead")]
    pub is_dead: bool,
    #[serde(rename = "isWon")]
    pub is_won: bool,
    #[serde(rename = "deathReason")]
    pub death_reason: Option<DeathReason>,
    #[serde(rename = "isRevivalPoint")]
    pub is_revival_point: bool,
    pub layers: Vec<LayerState>,
}

impl GameState {
    pub fn initial(map: &MapDefinition) -> Self {
        let mut next_ghost_id = 0;
        let layers = map
            .layers
            .iter()
            .map(|def| LayerState::from_definition(def, &mut next_ghost_id))
            .collect();
        let mut state = Self {
            player: PlayerState {
                x: map.start.x,
                y: map.start.y,
                layer: map.start.layer,
                hp: map.initial_health,
                stamina: map.initial_stamina,
                keys: 0,
                steps: 0,
                trail: Vec::new(),
            },
            loop_count: 0,
            is_dead: false,
            is_won: false,
            death_reason: None,
            is_revival_point: false,
            layers,
        };
        visibility::recompute(&mut state, map);
        state
    }

    /// Rebuilds every layer's ghosts, items, and walls from the definition
    /// while keeping the accumulated fog-of-war (a death-loop reset forgets
    /// the world's changes but not what the player has seen).
    pub(crate) fn reset_layers_preserving_seen(&mut self, map: &MapDefinition) {
        let mut next_ghost_id = 0;
        for (layer, def) in self.layers.iter_mut().zip(map.layers.iter()) {
            let seen = std::mem::take(&mut layer.seen);
            *layer = LayerState::from_definition(def, &mut next_ghost_id);
            layer.seen = seen;
        }
    }

    pub fn current_layer(&self) -> &LayerState {
        &self.layers[self.player.layer]
    }

    pub fn current_layer_mut(&mut self) -> &mut LayerState {
        &mut self.layers[self.player.layer]
    }

    pub fn is_terminal(&self, map: &MapDefinition) -> bool {
        if self.is_won {
            return true;
        }
        self.is_dead && map.game_mode == GameMode::Exploration && self.player.hp <= 0
    }

    pub fn status(&self, map: &MapDefinition) -> StatusView {
        match map.game_mode {
            GameMode::Exploration => StatusView::Exploration {
                hp: self.player.hp,
                keys: self.player.keys,
                steps: self.player.steps,
            },
            GameMode::DeathLoop => StatusView::DeathLoop {
                loop_count: self.loop_count,
                keys: self.player.keys,
                stamina: self.player.stamina,
            },
        }
    }

    pub fn outcome(&self) -> OutcomeView {
        OutcomeView {
            is_won: self.is_won,
            is_dead: self.is_dead,
            death_reason: self.death_reason,
            ghost_nearby: self.ghost_nearby(),
        }
    }

    /// Danger indicator: a ghost within one cell of the player whose cell
    /// the player has not seen yet.
    pub fn ghost_nearby(&self) -> bool {
        let layer = self.current_layer();
        layer
            .ghosts
            .iter()
            .any(|g| manhattan(g.pos(), self.player.pos()) <= 1 && !layer.is_seen(g.pos()))
    }
}
