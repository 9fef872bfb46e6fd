use serde::{Deserialize, Serialize};

use crate::constants::default_start_cell;
use crate::types::{Button, GameMode, Item, Stair, Vec2, Wall};

/// Immutable static description of one layer of a maze.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerDefinition {
    pub active_cells: Vec<Vec<bool>>,
    pub h_walls: Vec<Vec<Wall>>,
    pub v_walls: Vec<Vec<Wall>>,
    pub ghosts: Vec<Vec2>,
    pub items: Vec<Item>,
    pub buttons: Vec<Button>,
    pub end_pos: Vec2,
    pub custom_start_pos: Option<Vec2>,
}

impl LayerDefinition {
    pub fn open(width: i32, height: i32) -> Self {
        let w = width as usize;
        let h = height as usize;
        Self {
            active_cells: vec![vec![true; w]; h],
            h_walls: vec![vec![Wall::Empty; w]; h + 1],
            v_walls: vec![vec![Wall::Empty; w + 1]; h],
            ghosts: Vec::new(),
            items: Vec::new(),
            buttons: Vec::new(),
            end_pos: Vec2::new(width - 1, height - 1),
            custom_start_pos: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPos {
    pub x: i32,
    pub y: i32,
    pub layer: usize,
}

/// Immutable per-maze static description. Constructed once at load time and
/// never mutated; the engine derives every `GameState` from it.
#[derive(Clone, Debug, PartialEq)]
pub struct MapDefinition {
    pub width: i32,
    pub height: i32,
    pub game_mode: GameMode,
    pub initial_health: i32,
    pub initial_stamina: i32,
    pub free_form: bool,
    pub multi_layer: bool,
    pub layers: Vec<LayerDefinition>,
    pub stairs: Vec<Stair>,
    pub start: StartPos,
}

impl MapDefinition {
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn in_bounds(&self, pos: Vec2) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn is_active(&self, layer: usize, pos: Vec2) -> bool {
        if !self.in_bounds(pos) {
            return false;
        }
        self.layers
            .get(layer)
            .map(|l| l.active_cells[pos.y as usize][pos.x as usize])
            .unwrap_or(false)
    }

    pub fn stair_at(&self, layer: usize, pos: Vec2) -> Option<&Stair> {
        self.stairs
            .iter()
            .find(|s| s.layer == layer && s.x == pos.x && s.y == pos.y)
    }

    /// The matching stair on the adjacent layer, if the pair is intact.
    pub fn paired_stair(&self, stair: &Stair) -> Option<&Stair> {
        let target = stair.target_layer()?;
        self.stairs.iter().find(|other| {
            other.layer == target
                && other.x == stair.x
                && other.y == stair.y
                && other.direction != stair.direction
        })
    }

    pub fn from_description(desc: &MapDescription) -> Self {
        let width = desc.width.max(1);
        let height = desc.height.max(1);
        let layer_count = if desc.multi_layer_mode {
            desc.layer_count.max(desc.layers.len()).max(1)
        } else {
            1
        };

        let mut layers = Vec::with_capacity(layer_count);
        for index in 0..layer_count {
            layers.push(normalize_layer(
                desc.layers.get(index),
                width,
                height,
                desc.editor_mode,
            ));
        }

        let mut stairs: Vec<Stair> = desc
            .stairs
            .iter()
            .chain(desc.layers.iter().flat_map(|l| l.stairs.iter()))
            .copied()
            .filter(|s| {
                s.layer < layer_count
                    && s.x >= 0
                    && s.y >= 0
                    && s.x < width
                    && s.y < height
            })
            .collect();
        let mut deduped: Vec<Stair> = Vec::with_capacity(stairs.len());
        for stair in stairs {
            if !deduped.contains(&stair) {
                deduped.push(stair);
            }
        }
        let mut stairs = deduped;
        retain_paired_stairs(&mut stairs);

        let start_layer = desc.player_start_layer.min(layer_count - 1);
        let start_cell = desc
            .start_pos
            .or_else(|| layers[start_layer].custom_start_pos)
            .unwrap_or_else(|| {
                let (x, y) = default_start_cell();
                Vec2::new(x, y)
            });

        let mut map = Self {
            width,
            height,
            game_mode: desc.game_mode,
            initial_health: desc.initial_health.max(1),
            initial_stamina: desc.initial_stamina.max(1),
            free_form: desc.editor_mode,
            multi_layer: desc.multi_layer_mode,
            layers,
            stairs,
            start: StartPos {
                x: start_cell.x,
                y: start_cell.y,
                layer: start_layer,
            },
        };
        if !map.is_active(map.start.layer, start_cell) {
            map.start = fallback_start(&map);
        }
        map
    }

    /// Persistence-ready plain description for the external codec.
    pub fn to_description(&self) -> MapDescription {
        MapDescription {
            width: self.width,
            height: self.height,
            game_mode: self.game_mode,
            initial_health: self.initial_health,
            initial_stamina: self.initial_stamina,
            editor_mode: self.free_form,
            multi_layer_mode: self.multi_layer,
            layer_count: self.layers.len(),
            layers: self
                .layers
                .iter()
                .map(|layer| LayerDescription {
                    active_cells: layer.active_cells.clone(),
                    h_walls: layer.h_walls.clone(),
                    v_walls: layer.v_walls.clone(),
                    ghosts: layer.ghosts.clone(),
                    items: layer.items.clone(),
                    buttons: layer.buttons.clone(),
                    stairs: Vec::new(),
                    end_pos: layer.end_pos,
                    custom_start_pos: layer.custom_start_pos,
                })
                .collect(),
            stairs: self.stairs.clone(),
            start_pos: Some(Vec2::new(self.start.x, self.start.y)),
            player_start_layer: self.start.layer,
        }
    }
}

pub(crate) fn fallback_start(map: &MapDefinition) -> StartPos {
    for (layer, def) in map.layers.iter().enumerate() {
        for (y, row) in def.active_cells.iter().enumerate() {
            for (x, active) in row.iter().enumerate() {
                if *active {
                    return StartPos {
                        x: x as i32,
                        y: y as i32,
                        layer,
                    };
                }
            }
        }
    }
    StartPos {
        x: 0,
        y: 0,
        layer: 0,
    }
}

fn normalize_layer(
    desc: Option<&LayerDescription>,
    width: i32,
    height: i32,
    free_form: bool,
) -> LayerDefinition {
    let w = width as usize;
    let h = height as usize;
    let mut layer = LayerDefinition::open(width, height);
    let Some(desc) = desc else {
        return layer;
    };

    layer.active_cells = resize_grid(&desc.active_cells, w, h, !free_form || desc.active_cells.is_empty());
    layer.h_walls = resize_grid(&desc.h_walls, w, h + 1, Wall::Empty);
    layer.v_walls = resize_grid(&desc.v_walls, w + 1, h, Wall::Empty);
    layer.ghosts = desc
        .ghosts
        .iter()
        .copied()
        .filter(|g| g.x >= 0 && g.y >= 0 && g.x < width && g.y < height)
        .collect();
    layer.items = desc
        .items
        .iter()
        .copied()
        .filter(|i| i.x >= 0 && i.y >= 0 && i.x < width && i.y < height)
        .collect();
    layer.buttons = desc
        .buttons
        .iter()
        .copied()
        .filter(|b| b.x >= 0 && b.y >= 0 && b.x < width && b.y < height)
        .collect();
    layer.end_pos = desc.end_pos;
    layer.custom_start_pos = desc.custom_start_pos;
    layer
}

fn resize_grid<T: Clone>(source: &[Vec<T>], width: usize, height: usize, fill: T) -> Vec<Vec<T>> {
    let mut grid = Vec::with_capacity(height);
    for y in 0..height {
        let mut row = Vec::with_capacity(width);
        for x in 0..width {
            let value = source
                .get(y)
                .and_then(|r| r.get(x))
                .cloned()
                .unwrap_or_else(|| fill.clone());
            row.push(value);
        }
        grid.push(row);
    }
    grid
}

/// Drops any stair whose partner on the adjacent layer is missing, so the
/// definition never carries a dangling half of a pair.
pub fn retain_paired_stairs(stairs: &mut Vec<Stair>) {
    let snapshot = stairs.clone();
    stairs.retain(|stair| {
        let Some(target) = stair.target_layer() else {
            return false;
        };
        snapshot.iter().any(|other| {
            other.layer == target
                && other.x == stair.x
                && other.y == stair.y
                && other.direction != stair.direction
        })
    });
}

/// Plain, uncompressed wire form of a maze. The external share-code codec
/// compresses and versions this; the engine never sees its byte format.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDescription {
    pub width: i32,
    pub height: i32,
    pub game_mode: GameMode,
    #[serde(default = "crate::constants::default_health")]
    pub initial_health: i32,
    #[serde(default = "crate::constants::default_stamina")]
    pub initial_stamina: i32,
    #[serde(default)]
    pub editor_mode: bool,
    #[serde(default)]
    pub multi_layer_mode: bool,
    #[serde(default = "one")]
    pub layer_count: usize,
    #[serde(default)]
    pub layers: Vec<LayerDescription>,
    #[serde(default)]
    pub stairs: Vec<Stair>,
    #[serde(default)]
    pub start_pos: Option<Vec2>,
    #[serde(default)]
    pub player_start_layer: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDescription {
    #[serde(default)]
    pub active_cells: Vec<Vec<bool>>,
    #[serde(default)]
    pub h_walls: Vec<Vec<Wall>>,
    #[serde(default)]
    pub v_walls: Vec<Vec<Wall>>,
    #[serde(default)]
    pub ghosts: Vec<Vec2>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub buttons: Vec<Button>,
    #[serde(default)]
    pub stairs: Vec<Stair>,
    #[serde(default)]
    pub end_pos: Vec2,
    #[serde(default)]
    pub custom_start_pos: Option<Vec2>,
}

fn one() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemKind, StairDirection};

    fn minimal_description(width: i32, height: i32) -> MapDescription {
        MapDescription {
            width,
            height,
            game_mode: GameMode::Exploration,
            initial_health: 3,
            initial_stamina: 50,
            editor_mode: false,
            multi_layer_mode: false,
            layer_count: 1,
            layers: Vec::new(),
            stairs: Vec::new(),
            start_pos: None,
            player_start_layer: 0,
        }
    }

    #[test]
    fn missing_sections_are_treated_as_absent() {
        let raw = r#"{"width":5,"height":5,"gameMode":"exploration"}"#;
        let desc: MapDescription =
            serde_json::from_str(raw).expect("lenient description should parse");
        let map = MapDefinition::from_description(&desc);
        assert_eq!(map.layer_count(), 1);
        assert!(map.stairs.is_empty());
        assert!(map.layers[0].buttons.is_empty());
        assert_eq!((map.start.x, map.start.y), (1, 1));
    }

    #[test]
    fn dangling_stairs_are_dropped_on_import() {
        let mut desc = minimal_description(6, 6);
        desc.multi_layer_mode = true;
        desc.layer_count = 2;
        desc.stairs = vec![
            Stair {
                x: 3,
                y: 3,
                layer: 0,
                direction: StairDirection::Up,
            },
            Stair {
                x: 3,
                y: 3,
                layer: 1,
                direction: StairDirection::Down,
            },
            // No partner on layer 1 at (2, 2).
            Stair {
                x: 2,
                y: 2,
                layer: 0,
                direction: StairDirection::Up,
            },
        ];
        let map = MapDefinition::from_description(&desc);
        assert_eq!(map.stairs.len(), 2);
        assert!(map.stairs.iter().all(|s| s.x == 3 && s.y == 3));
    }

    #[test]
    fn paired_stair_lookup_crosses_layers_both_ways() {
        let mut desc = minimal_description(6, 6);
        desc.multi_layer_mode = true;
        desc.layer_count = 2;
        desc.stairs = vec![
            Stair {
                x: 3,
                y: 3,
                layer: 0,
                direction: StairDirection::Up,
            },
            Stair {
                x: 3,
                y: 3,
                layer: 1,
                direction: StairDirection::Down,
            },
        ];
        let map = MapDefinition::from_description(&desc);
        let up = map.stair_at(0, Vec2::new(3, 3)).expect("stair on layer 0");
        let down = map.paired_stair(up).expect("paired stair on layer 1");
        assert_eq!(down.layer, 1);
        assert_eq!(map.paired_stair(down).expect("pair back").layer, 0);
    }

    #[test]
    fn start_falls_back_to_an_active_cell() {
        let mut desc = minimal_description(4, 4);
        desc.editor_mode = true;
        let mut layer = LayerDescription::default();
        let mut active = vec![vec![false; 4]; 4];
        active[2][3] = true;
        layer.active_cells = active;
        desc.layers = vec![layer];
        let map = MapDefinition::from_description(&desc);
        assert_eq!((map.start.x, map.start.y), (3, 2));
    }

    #[test]
    fn out_of_bounds_entities_are_dropped() {
        let mut desc = minimal_description(4, 4);
        let layer = LayerDescription {
            ghosts: vec![Vec2::new(2, 2), Vec2::new(9, 9)],
            items: vec![Item {
                x: -1,
                y: 0,
                kind: ItemKind::Key,
            }],
            ..Default::default()
        };
        desc.layers = vec![layer];
        let map = MapDefinition::from_description(&desc);
        assert_eq!(map.layers[0].ghosts, vec![Vec2::new(2, 2)]);
        assert!(map.layers[0].items.is_empty());
    }

    #[test]
    fn description_round_trips_through_definition() {
        let mut desc = minimal_description(5, 4);
        let mut layer = LayerDescription {
            end_pos: Vec2::new(4, 3),
            ..Default::default()
        };
        layer.h_walls = vec![vec![Wall::Solid; 5]; 5];
        desc.layers = vec![layer];
        let map = MapDefinition::from_description(&desc);
        let exported = map.to_description();
        let reimported = MapDefinition::from_description(&exported);
        assert_eq!(map, reimported);
    }

    #[test]
    fn grids_are_resized_to_declared_dimensions() {
        let mut desc = minimal_description(3, 3);
        let layer = LayerDescription {
            h_walls: vec![vec![Wall::Solid]],
            ..Default::default()
        };
        desc.layers = vec![layer];
        let map = MapDefinition::from_description(&desc);
        assert_eq!(map.layers[0].h_walls.len(), 4);
        assert_eq!(map.layers[0].h_walls[0].len(), 3);
        assert_eq!(map.layers[0].h_walls[0][0], Wall::Solid);
        assert_eq!(map.layers[0].h_walls[0][1], Wall::Empty);
        assert_eq!(map.layers[0].v_walls.len(), 3);
        assert_eq!(map.layers[0].v_walls[0].len(), 4);
    }
}
