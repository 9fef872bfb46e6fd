use crate::ghosts;
use crate::map::MapDefinition;
use crate::state::GameState;
use crate::types::{Action, DeathReason, Direction, GameMode, ItemKind, TrailPoint, Wall};
use crate::visibility;

/// The pure transition function: one discrete player action against one
/// snapshot. Returns `None` when the action has no effect (blocked move,
/// unavailable stair, nothing to press), so callers can skip history
/// recording. The input state is never touched.
pub fn transition(state: &GameState, action: Action, map: &MapDefinition) -> Option<GameState> {
    if state.is_won {
        return None;
    }
    if state.is_dead && !matches!(action, Action::Revive) {
        return None;
    }
    match action {
        Action::PressButton(letter) => press_button(state, letter),
        Action::Move(dir) => apply_move(state, dir, map),
        Action::UseStair => use_stair(state, map),
        Action::Revive => revive(state, map),
    }
}

fn press_button(state: &GameState, letter: char) -> Option<GameState> {
    let layer = state.current_layer();
    let matches_letter = |wall: &Wall| matches!(wall, Wall::LetterDoor { letter: l, .. } if *l == letter);
    let any = layer
        .h_walls
        .iter()
        .flatten()
        .chain(layer.v_walls.iter().flatten())
        .any(|wall| matches_letter(wall));
    if !any {
        return None;
    }

    let mut next = state.clone();
    next.is_revival_point = false;
    let layer = next.current_layer_mut();
    for wall in layer
        .h_walls
        .iter_mut()
        .flatten()
        .chain(layer.v_walls.iter_mut().flatten())
    {
        if let Wall::LetterDoor { letter: l, is_open } = wall {
            if *l == letter {
                *is_open = !*is_open;
            }
        }
    }
    Some(next)
}

fn apply_move(state: &GameState, dir: Direction, map: &MapDefinition) -> Option<GameState> {
    let pre = state.player.pos();
    let layer_idx = state.player.layer;

    // A button pointing the way the player pushed takes the move over.
    let button = map.layers[layer_idx]
        .buttons
        .iter()
        .find(|b| b.x == pre.x && b.y == pre.y && b.direction == dir);
    if let Some(button) = button {
        return press_button(state, button.letter);
    }

    let post = pre.offset(dir);
    if !map.is_active(layer_idx, post) {
        return None;
    }
    let wall = state.current_layer().wall_between(pre, dir);
    if wall.blocks_player(dir, state.player.keys) {
        return None;
    }

    let mut next = state.clone();
    next.is_revival_point = false;
    if matches!(wall, Wall::Locked { .. }) {
        // Paying the toll opens the door for good; keys are kept.
        next.current_layer_mut()
            .set_wall_between(pre, dir, Wall::Empty);
    }
    next.player.trail.push(TrailPoint {
        x: pre.x,
        y: pre.y,
        step: state.player.steps,
    });
    next.player.x = post.x;
    next.player.y = post.y;
    next.player.steps += 1;
    if map.game_mode == GameMode::DeathLoop {
        next.player.stamina -= 1;
    }

    visibility::recompute(&mut next, map);
    collect_item(&mut next);

    if post == map.layers[layer_idx].end_pos {
        next.is_won = true;
        return Some(next);
    }
    if map.game_mode == GameMode::DeathLoop && next.player.stamina <= 0 {
        mark_dead(&mut next, DeathReason::StaminaDepleted, map);
        return Some(next);
    }
    if next.current_layer().has_ghost_at(post) {
        mark_dead(&mut next, DeathReason::Ghost, map);
        return Some(next);
    }

    let step = next.player.steps;
    ghosts::run(&mut next.layers[layer_idx], map, layer_idx, pre, post, step);
    if next.current_layer().has_ghost_at(post) {
        mark_dead(&mut next, DeathReason::Ghost, map);
    }
    Some(next)
}

fn use_stair(state: &GameState, map: &MapDefinition) -> Option<GameState> {
    if !map.multi_layer {
        return None;
    }
    let pos = state.player.pos();
    let stair = map.stair_at(state.player.layer, pos)?;
    let arrival_layer = map.paired_stair(stair)?.layer;

    let mut next = state.clone();
    next.is_revival_point = false;
    next.player.steps += 1;
    if map.game_mode == GameMode::DeathLoop {
        next.player.stamina -= 1;
    }

    // Ghosts standing on the stair ride along, their trails reset.
    let departure_layer = state.player.layer;
    let riders = {
        let layer = &mut next.layers[departure_layer];
        let (riders, staying): (Vec<_>, Vec<_>) =
            layer.ghosts.drain(..).partition(|g| g.pos() == pos);
        layer.ghosts = staying;
        riders
    };
    for mut rider in riders {
        rider.trail.clear();
        next.layers[arrival_layer].ghosts.push(rider);
    }

    next.player.layer = arrival_layer;
    visibility::recompute(&mut next, map);

    if pos == map.layers[arrival_layer].end_pos {
        next.is_won = true;
        return Some(next);
    }
    if map.game_mode == GameMode::DeathLoop && next.player.stamina <= 0 {
        mark_dead(&mut next, DeathReason::StaminaDepleted, map);
        return Some(next);
    }
    if next.current_layer().has_ghost_at(pos) {
        mark_dead(&mut next, DeathReason::Ghost, map);
    }
    Some(next)
}

fn revive(state: &GameState, map: &MapDefinition) -> Option<GameState> {
    match map.game_mode {
        GameMode::Exploration => {
            // The death event already took the hp; at zero the run is over
            // and revival is not offered.
            if !state.is_dead || state.player.hp <= 0 {
                return None;
            }
            let mut next = state.clone();
            next.player.x = map.start.x;
            next.player.y = map.start.y;
            next.player.layer = map.start.layer;
            next.player.trail.clear();
            next.is_dead = false;
            next.death_reason = None;
            next.is_revival_point = true;
            visibility::recompute(&mut next, map);
            Some(next)
        }
        GameMode::DeathLoop => {
            let mut next = state.clone();
            next.loop_count += 1;
            next.player.x = map.start.x;
            next.player.y = map.start.y;
            next.player.layer = map.start.layer;
            next.player.keys = 0;
            next.player.steps = 0;
            next.player.stamina = map.initial_stamina;
            next.player.trail.clear();
            next.reset_layers_preserving_seen(map);
            next.is_dead = false;
            next.death_reason = None;
            next.is_revival_point = true;
            visibility::recompute(&mut next, map);
            Some(next)
        }
    }
}

fn mark_dead(state: &mut GameState, reason: DeathReason, map: &MapDefinition) {
    state.is_dead = true;
    state.death_reason = Some(reason);
    if map.game_mode == GameMode::Exploration {
        state.player.hp -= 1;
    }
}

fn collect_item(state: &mut GameState) {
    let pos = state.player.pos();
    let layer = state.current_layer_mut();
    let found = layer
        .items
        .iter()
        .position(|item| item.x == pos.x && item.y == pos.y);
    let Some(index) = found else {
        return;
    };
    let item = layer.items.remove(index);
    match item.kind {
        ItemKind::Key => state.player.keys += 1,
    }
}
