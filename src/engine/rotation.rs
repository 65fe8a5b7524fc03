//! Weekly cleaning rotation.
//!
//! Rooms at the week's rest level are excluded before any scoring. The garden
//! goes to the eligible room that held it longest ago; every other room takes
//! the fallback area it held longest ago, preferring areas nobody has taken
//! yet in this pass. A missing history entry counts as timestamp 0, so rooms
//! that never held an area always win ties against rooms that did.

use std::collections::{HashMap, HashSet};

use ulid::Ulid;

use crate::model::*;

use super::EngineError;

/// One planned (room, area) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pick {
    pub room_id: Ulid,
    pub area_id: Ulid,
}

/// Most recent timestamp per (room, area).
pub fn last_assigned(history: &[HistoryEntry]) -> HashMap<(Ulid, Ulid), Ms> {
    let mut latest: HashMap<(Ulid, Ulid), Ms> = HashMap::new();
    for entry in history {
        let slot = latest.entry((entry.room_id, entry.area_id)).or_insert(entry.created_at);
        if entry.created_at > *slot {
            *slot = entry.created_at;
        }
    }
    latest
}

/// Rooms that clean this week, in rotation order.
pub fn eligible_rooms<'a>(rooms: &'a [Room], rest_level: Option<RestLevel>) -> Vec<&'a Room> {
    let mut eligible: Vec<&Room> = rooms
        .iter()
        .filter(|r| rest_level.is_none_or(|level| r.level != i32::from(level)))
        .collect();
    eligible.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
    eligible
}

/// Active areas in (position, name) order.
pub fn active_areas(areas: &[CleaningArea]) -> Vec<&CleaningArea> {
    let mut active: Vec<&CleaningArea> = areas.iter().filter(|a| a.active).collect();
    active.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
    active
}

/// Compute the assignment set for one week. Pure: no I/O, deterministic for
/// a given input. Returns picks in room rotation order, one per eligible room.
pub fn plan_rotation(
    rooms: &[Room],
    areas: &[CleaningArea],
    history: &[HistoryEntry],
    rest_level: Option<RestLevel>,
) -> Result<Vec<Pick>, EngineError> {
    let areas = active_areas(areas);
    if areas.is_empty() {
        return Err(EngineError::NoActiveAreas);
    }
    let rooms = eligible_rooms(rooms, rest_level);
    if rooms.is_empty() {
        return Err(EngineError::NoEligibleRooms { rest_level });
    }

    let last = last_assigned(history);
    let stamp = |room: Ulid, area: Ulid| last.get(&(room, area)).copied().unwrap_or(0);

    let garden = areas.iter().copied().find(|a| a.is_garden());
    let mut pool: Vec<&CleaningArea> = areas
        .iter()
        .copied()
        .filter(|a| garden.is_none_or(|g| g.id != a.id))
        .collect();
    // Garden is the only active area: every room still needs one, so it is shared.
    if pool.is_empty() {
        pool = areas.clone();
    }

    let mut used: HashSet<Ulid> = HashSet::new();

    let garden_room = garden.and_then(|g| {
        // min_by_key keeps the first of equal minima, which is the room-order tie-break.
        let room = rooms.iter().min_by_key(|r| stamp(r.id, g.id))?;
        used.insert(g.id);
        Some((room.id, g.id))
    });

    let mut picks = Vec::with_capacity(rooms.len());
    for room in &rooms {
        if let Some((garden_room_id, garden_id)) = garden_room
            && room.id == garden_room_id
        {
            picks.push(Pick {
                room_id: room.id,
                area_id: garden_id,
            });
            continue;
        }
        let chosen = pool
            .iter()
            .min_by_key(|a| (used.contains(&a.id), stamp(room.id, a.id)))
            .map(|a| a.id);
        if let Some(area_id) = chosen {
            used.insert(area_id);
            picks.push(Pick {
                room_id: room.id,
                area_id,
            });
        }
    }

    Ok(picks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Ms = 86_400_000;
    const NOW: Ms = 1_725_000_000_000;

    fn room(label: &str, level: i32, position: i32) -> Room {
        Room {
            id: Ulid::new(),
            label: label.into(),
            capacity: 4,
            level,
            position,
        }
    }

    fn area(name: &str, position: i32) -> CleaningArea {
        CleaningArea {
            id: Ulid::new(),
            name: name.into(),
            active: true,
            position,
        }
    }

    fn held(room: &Room, area: &CleaningArea, at: Ms) -> HistoryEntry {
        HistoryEntry {
            room_id: room.id,
            area_id: area.id,
            created_at: at,
        }
    }

    fn area_of(picks: &[Pick], room: &Room) -> Option<Ulid> {
        picks.iter().find(|p| p.room_id == room.id).map(|p| p.area_id)
    }

    #[test]
    fn no_active_areas_fails() {
        let rooms = vec![room("101", 1, 0)];
        let mut kitchen = area("Kitchen", 0);
        kitchen.active = false;
        let result = plan_rotation(&rooms, &[kitchen], &[], Some(2));
        assert!(matches!(result, Err(EngineError::NoActiveAreas)));
        let result = plan_rotation(&rooms, &[], &[], Some(2));
        assert!(matches!(result, Err(EngineError::NoActiveAreas)));
    }

    #[test]
    fn all_rooms_resting_fails() {
        let rooms = vec![room("201", 2, 0), room("202", 2, 1)];
        let areas = vec![area("Kitchen", 0)];
        let result = plan_rotation(&rooms, &areas, &[], Some(2));
        assert!(matches!(
            result,
            Err(EngineError::NoEligibleRooms { rest_level: Some(2) })
        ));
    }

    #[test]
    fn rest_level_rooms_never_assigned() {
        let rooms: Vec<Room> = (0..9).map(|i| room(&format!("r{i}"), i % 3 + 1, i)).collect();
        let areas = vec![area("Garden", 0), area("Kitchen", 1), area("Hallway", 2)];
        for rest in 1..=3u8 {
            let picks = plan_rotation(&rooms, &areas, &[], Some(rest)).unwrap();
            assert_eq!(picks.len(), 6);
            for p in &picks {
                let r = rooms.iter().find(|r| r.id == p.room_id).unwrap();
                assert_ne!(r.level, i32::from(rest));
            }
        }
    }

    #[test]
    fn each_eligible_room_exactly_once() {
        let rooms: Vec<Room> = (0..7).map(|i| room(&format!("r{i}"), 1, i)).collect();
        let areas = vec![area("Kitchen", 0), area("Hallway", 1)];
        let picks = plan_rotation(&rooms, &areas, &[], Some(3)).unwrap();
        assert_eq!(picks.len(), rooms.len());
        let distinct: HashSet<Ulid> = picks.iter().map(|p| p.room_id).collect();
        assert_eq!(distinct.len(), rooms.len());
    }

    #[test]
    fn no_rest_level_excludes_nobody() {
        let rooms = vec![room("101", 1, 0), room("201", 2, 0), room("301", 3, 0)];
        let areas = vec![area("Kitchen", 0)];
        let picks = plan_rotation(&rooms, &areas, &[], None).unwrap();
        assert_eq!(picks.len(), 3);
    }

    #[test]
    fn garden_goes_to_least_recent_holder() {
        let a = room("A", 1, 0);
        let b = room("B", 1, 1);
        let garden = area("Garden", 0);
        let kitchen = area("Kitchen", 1);
        let history = vec![held(&a, &garden, NOW - 10 * DAY), held(&b, &garden, NOW - 30 * DAY)];
        let picks = plan_rotation(&[a.clone(), b.clone()], &[garden.clone(), kitchen.clone()], &history, Some(3)).unwrap();
        assert_eq!(area_of(&picks, &b), Some(garden.id));
        assert_eq!(area_of(&picks, &a), Some(kitchen.id));
    }

    #[test]
    fn garden_prefers_room_that_never_held_it() {
        let a = room("A", 1, 0);
        let b = room("B", 1, 1);
        let garden = area("Front garden", 0);
        let history = vec![held(&a, &garden, NOW - 10 * DAY)];
        let picks = plan_rotation(&[a.clone(), b.clone()], &[garden.clone(), area("Kitchen", 1)], &history, Some(3)).unwrap();
        assert_eq!(area_of(&picks, &b), Some(garden.id));
    }

    #[test]
    fn garden_tie_goes_to_first_room() {
        // Scenario: Garden/Kitchen/Hallway, R1 R2 at level 1, R3 at level 2, rest level 2.
        let r1 = room("R1", 1, 0);
        let r2 = room("R2", 1, 1);
        let r3 = room("R3", 2, 0);
        let garden = area("Garden", 0);
        let kitchen = area("Kitchen", 1);
        let hallway = area("Hallway", 2);
        let rooms = vec![r3.clone(), r2.clone(), r1.clone()];
        let areas = vec![hallway.clone(), garden.clone(), kitchen.clone()];

        let picks = plan_rotation(&rooms, &areas, &[], Some(2)).unwrap();
        assert_eq!(picks.len(), 2);
        assert_eq!(area_of(&picks, &r3), None);
        assert_eq!(area_of(&picks, &r1), Some(garden.id));
        // Both fallback areas unused and never held: pool order decides.
        assert_eq!(area_of(&picks, &r2), Some(kitchen.id));
    }

    #[test]
    fn scenario_garden_follows_older_history() {
        let r1 = room("R1", 1, 0);
        let r2 = room("R2", 1, 1);
        let r3 = room("R3", 2, 0);
        let garden = area("Garden", 0);
        let kitchen = area("Kitchen", 1);
        let hallway = area("Hallway", 2);
        let history = vec![
            held(&r1, &garden, NOW - 3 * DAY),
            held(&r2, &garden, NOW - 20 * DAY),
            held(&r2, &kitchen, NOW - DAY),
        ];
        let picks = plan_rotation(
            &[r1.clone(), r2.clone(), r3.clone()],
            &[garden.clone(), kitchen.clone(), hallway.clone()],
            &history,
            Some(2),
        )
        .unwrap();
        assert_eq!(area_of(&picks, &r2), Some(garden.id));
        assert_eq!(area_of(&picks, &r1), Some(kitchen.id));
        assert_eq!(area_of(&picks, &r3), None);
    }

    #[test]
    fn fallback_prefers_oldest_area_for_room() {
        let r = room("101", 1, 0);
        let kitchen = area("Kitchen", 0);
        let hallway = area("Hallway", 1);
        let bath = area("Bathroom", 2);
        let history = vec![
            held(&r, &kitchen, NOW - DAY),
            held(&r, &hallway, NOW - 14 * DAY),
            held(&r, &bath, NOW - 7 * DAY),
        ];
        let picks = plan_rotation(&[r.clone()], &[kitchen, hallway.clone(), bath], &history, Some(3)).unwrap();
        assert_eq!(picks, vec![Pick { room_id: r.id, area_id: hallway.id }]);
    }

    #[test]
    fn unused_areas_beat_older_history() {
        let r1 = room("101", 1, 0);
        let r2 = room("102", 1, 1);
        let kitchen = area("Kitchen", 0);
        let hallway = area("Hallway", 1);
        // Both rooms held the hallway recently and never the kitchen.
        let history = vec![held(&r1, &hallway, NOW - DAY), held(&r2, &hallway, NOW - DAY)];
        let picks = plan_rotation(&[r1.clone(), r2.clone()], &[kitchen.clone(), hallway.clone()], &history, Some(3)).unwrap();
        assert_eq!(area_of(&picks, &r1), Some(kitchen.id));
        // Kitchen is taken in this pass, so r2 gets the hallway despite its history.
        assert_eq!(area_of(&picks, &r2), Some(hallway.id));
    }

    #[test]
    fn areas_reused_when_rooms_outnumber_pool() {
        let rooms: Vec<Room> = (0..5).map(|i| room(&format!("r{i}"), 1, i)).collect();
        let kitchen = area("Kitchen", 0);
        let hallway = area("Hallway", 1);
        let picks = plan_rotation(&rooms, &[kitchen.clone(), hallway.clone()], &[], Some(3)).unwrap();
        assert_eq!(picks.len(), 5);
        assert_eq!(picks[0].area_id, kitchen.id);
        assert_eq!(picks[1].area_id, hallway.id);
        assert!(picks[2..].iter().all(|p| p.area_id == kitchen.id || p.area_id == hallway.id));
    }

    #[test]
    fn garden_only_area_still_covers_every_room() {
        let rooms = vec![room("101", 1, 0), room("102", 1, 1)];
        let garden = area("Garden", 0);
        let picks = plan_rotation(&rooms, &[garden.clone()], &[], Some(3)).unwrap();
        assert_eq!(picks.len(), 2);
        assert!(picks.iter().all(|p| p.area_id == garden.id));
    }

    #[test]
    fn without_garden_all_areas_rotate() {
        let r1 = room("101", 1, 0);
        let r2 = room("102", 1, 1);
        let kitchen = area("Kitchen", 0);
        let hallway = area("Hallway", 1);
        let history = vec![held(&r1, &kitchen, NOW - DAY)];
        let picks = plan_rotation(&[r1.clone(), r2.clone()], &[kitchen.clone(), hallway.clone()], &history, Some(3)).unwrap();
        assert_eq!(area_of(&picks, &r1), Some(hallway.id));
        assert_eq!(area_of(&picks, &r2), Some(kitchen.id));
    }

    #[test]
    fn inactive_garden_is_ignored() {
        let r1 = room("101", 1, 0);
        let mut garden = area("Garden", 0);
        garden.active = false;
        let kitchen = area("Kitchen", 1);
        let picks = plan_rotation(&[r1.clone()], &[garden, kitchen.clone()], &[], Some(3)).unwrap();
        assert_eq!(area_of(&picks, &r1), Some(kitchen.id));
    }

    #[test]
    fn fresh_room_wins_contested_area() {
        // One area, one eligible room per run: the room with no history for it is preferred
        // over one that held it yesterday when both compete for the garden.
        let veteran = room("101", 1, 0);
        let newcomer = room("102", 1, 1);
        let garden = area("Garden", 0);
        let history = vec![held(&veteran, &garden, NOW - DAY)];
        let picks = plan_rotation(&[veteran.clone(), newcomer.clone()], &[garden.clone(), area("Kitchen", 1)], &history, Some(3)).unwrap();
        assert_eq!(area_of(&picks, &newcomer), Some(garden.id));
    }

    #[test]
    fn planning_is_deterministic() {
        let rooms: Vec<Room> = (0..6).map(|i| room(&format!("r{i}"), i % 2 + 1, i)).collect();
        let areas = vec![area("Garden", 0), area("Kitchen", 1), area("Hallway", 2), area("Stairs", 3)];
        let history = vec![held(&rooms[1], &areas[2], NOW - 5 * DAY), held(&rooms[3], &areas[0], NOW - 2 * DAY)];
        let first = plan_rotation(&rooms, &areas, &history, Some(1)).unwrap();
        let second = plan_rotation(&rooms, &areas, &history, Some(1)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn last_assigned_keeps_max() {
        let r = room("101", 1, 0);
        let a = area("Kitchen", 0);
        let history = vec![held(&r, &a, 5), held(&r, &a, 50), held(&r, &a, 20)];
        assert_eq!(last_assigned(&history).get(&(r.id, a.id)), Some(&50));
    }
}
