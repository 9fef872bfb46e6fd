use crate::constants::{clamp_map_side, default_start_cell, DEFAULT_HEALTH, DEFAULT_STAMINA, MAX_LAYERS};
use crate::map::{fallback_start, retain_paired_stairs, LayerDefinition, MapDefinition, StartPos};
use crate::types::{Button, Direction, GameMode, Item, ItemKind, Stair, StairDirection, Vec2, Wall};

/// Programmatic maze editor. Accumulates edits against mutable layer grids
/// and emits a validated `MapDefinition` on `build`; stairs without a live
/// partner and entities knocked out of bounds never reach the definition.
#[derive(Clone, Debug)]
pub struct MapBuilder {
    width: i32,
    height: i32,
    game_mode: GameMode,
    initial_health: i32,
    initial_stamina: i32,
    free_form: bool,
    multi_layer: bool,
    layers: Vec<LayerDefinition>,
    stairs: Vec<Stair>,
    start: Option<StartPos>,
}

impl MapBuilder {
    pub fn new(width: i32, height: i32) -> Self {
        let width = clamp_map_side(width);
        let height = clamp_map_side(height);
        Self {
            width,
            height,
            game_mode: GameMode::Exploration,
            initial_health: DEFAULT_HEALTH,
            initial_stamina: DEFAULT_STAMINA,
            free_form: false,
            multi_layer: false,
            layers: vec![LayerDefinition::open(width, height)],
            stairs: Vec::new(),
            start: None,
        }
    }

    pub fn game_mode(&mut self, mode: GameMode) -> &mut Self {
        self.game_mode = mode;
        self
    }

    pub fn initial_health(&mut self, health: i32) -> &mut Self {
        self.initial_health = health.max(1);
        self
    }

    pub fn initial_stamina(&mut self, stamina: i32) -> &mut Self {
        self.initial_stamina = stamina.max(1);
        self
    }

    pub fn free_form(&mut self, enabled: bool) -> &mut Self {
        self.free_form = enabled;
        self
    }

    pub fn multi_layer(&mut self, enabled: bool) -> &mut Self {
        self.multi_layer = enabled;
        self
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Appends an empty open layer and returns its index, or the last index
    /// unchanged once the layer cap is reached.
    pub fn add_layer(&mut self) -> usize {
        if self.layers.len() < MAX_LAYERS {
            self.layers.push(LayerDefinition::open(self.width, self.height));
        }
        self.layers.len() - 1
    }

    /// Removes a layer. Stairs on the removed layer disappear, stairs above
    /// it shift down one index, and any half-pair left behind is dropped.
    pub fn remove_layer(&mut self, layer: usize) -> &mut Self {
        if self.layers.len() <= 1 || layer >= self.layers.len() {
            return self;
        }
        self.layers.remove(layer);
        self.stairs.retain(|s| s.layer != layer);
        for stair in &mut self.stairs {
            if stair.layer > layer {
                stair.layer -= 1;
            }
        }
        retain_paired_stairs(&mut self.stairs);
        if let Some(start) = self.start {
            if start.layer == layer {
                self.start = None;
            } else if start.layer > layer {
                self.start = Some(StartPos {
                    layer: start.layer - 1,
                    ..start
                });
            }
        }
        self
    }

    pub fn set_active(&mut self, layer: usize, pos: Vec2, active: bool) -> &mut Self {
        if self.in_bounds(pos) {
            if let Some(def) = self.layers.get_mut(layer) {
                def.active_cells[pos.y as usize][pos.x as usize] = active;
            }
        }
        self
    }

    /// Sets the wall on one edge of a cell. The shared edge grids mean the
    /// same wall is seen from both adjacent cells.
    pub fn set_wall(&mut self, layer: usize, pos: Vec2, direction: Direction, wall: Wall) -> &mut Self {
        if !self.in_bounds(pos) {
            return self;
        }
        let Some(def) = self.layers.get_mut(layer) else {
            return self;
        };
        let x = pos.x as usize;
        let y = pos.y as usize;
        match direction {
            Direction::Up => def.h_walls[y][x] = wall,
            Direction::Down => def.h_walls[y + 1][x] = wall,
            Direction::Left => def.v_walls[y][x] = wall,
            Direction::Right => def.v_walls[y][x + 1] = wall,
        }
        self
    }

    pub fn add_ghost(&mut self, layer: usize, pos: Vec2) -> &mut Self {
        if self.in_bounds(pos) {
            if let Some(def) = self.layers.get_mut(layer) {
                if !def.ghosts.contains(&pos) {
                    def.ghosts.push(pos);
                }
            }
        }
        self
    }

    pub fn remove_ghost(&mut self, layer: usize, pos: Vec2) -> &mut Self {
        if let Some(def) = self.layers.get_mut(layer) {
            def.ghosts.retain(|g| *g != pos);
        }
        self
    }

    pub fn add_key(&mut self, layer: usize, pos: Vec2) -> &mut Self {
        if self.in_bounds(pos) {
            if let Some(def) = self.layers.get_mut(layer) {
                def.items.push(Item {
                    x: pos.x,
                    y: pos.y,
                    kind: ItemKind::Key,
                });
            }
        }
        self
    }

    pub fn remove_items(&mut self, layer: usize, pos: Vec2) -> &mut Self {
        if let Some(def) = self.layers.get_mut(layer) {
            def.items.retain(|i| i.x != pos.x || i.y != pos.y);
        }
        self
    }

    pub fn add_button(&mut self, layer: usize, button: Button) -> &mut Self {
        if self.in_bounds(Vec2::new(button.x, button.y)) {
            if let Some(def) = self.layers.get_mut(layer) {
                def.buttons.push(button);
            }
        }
        self
    }

    pub fn remove_buttons(&mut self, layer: usize, pos: Vec2) -> &mut Self {
        if let Some(def) = self.layers.get_mut(layer) {
            def.buttons.retain(|b| b.x != pos.x || b.y != pos.y);
        }
        self
    }

    /// Places both halves of a stair pair: an ascending stair on `lower` and
    /// the matching descending stair directly above it.
    pub fn add_stair_pair(&mut self, lower: usize, pos: Vec2) -> &mut Self {
        if !self.in_bounds(pos) || lower + 1 >= self.layers.len() {
            return self;
        }
        let up = Stair {
            x: pos.x,
            y: pos.y,
            layer: lower,
            direction: StairDirection::Up,
        };
        let down = Stair {
            x: pos.x,
            y: pos.y,
            layer: lower + 1,
            direction: StairDirection::Down,
        };
        if !self.stairs.contains(&up) {
            self.stairs.push(up);
        }
        if !self.stairs.contains(&down) {
            self.stairs.push(down);
        }
        self
    }

    pub fn remove_stair_pair(&mut self, lower: usize, pos: Vec2) -> &mut Self {
        self.stairs.retain(|s| {
            !(s.x == pos.x && s.y == pos.y && (s.layer == lower || s.layer == lower + 1))
        });
        self
    }

    pub fn set_end(&mut self, layer: usize, pos: Vec2) -> &mut Self {
        if self.in_bounds(pos) {
            if let Some(def) = self.layers.get_mut(layer) {
                def.end_pos = pos;
            }
        }
        self
    }

    pub fn set_start(&mut self, layer: usize, pos: Vec2) -> &mut Self {
        if self.in_bounds(pos) && layer < self.layers.len() {
            self.start = Some(StartPos {
                x: pos.x,
                y: pos.y,
                layer,
            });
        }
        self
    }

    pub fn build(&self) -> MapDefinition {
        let mut stairs = self.stairs.clone();
        retain_paired_stairs(&mut stairs);
        let start = self.start.unwrap_or_else(|| {
            let (x, y) = default_start_cell();
            StartPos { x, y, layer: 0 }
        });
        let mut map = MapDefinition {
            width: self.width,
            height: self.height,
            game_mode: self.game_mode,
            initial_health: self.initial_health,
            initial_stamina: self.initial_stamina,
            free_form: self.free_form,
            multi_layer: self.multi_layer || self.layers.len() > 1,
            layers: self.layers.clone(),
            stairs,
            start,
        };
        if !map.is_active(map.start.layer, Vec2::new(map.start.x, map.start.y)) {
            map.start = fallback_start(&map);
        }
        map
    }

    fn in_bounds(&self, pos: Vec2) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }
}
