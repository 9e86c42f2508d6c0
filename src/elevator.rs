use crate::components::{Direction, GameConfig};

/// The cab that carries the player between floors. Each floor has two rooms, one
/// through each side of the cab.
///
/// Floor 1 is the ground floor. `y` is the cab's position in the shaft in screen space,
/// so higher floors have smaller `y`.
#[derive(Clone, Debug)]
pub struct Elevator {
    pub current_floor: u32,
    pub floors: u32,
    pub y: f32,
    pub moving: bool,
    floor_height: f32,
    speed: f32,
}

impl Elevator {
    pub fn new(config: &GameConfig) -> Self {
        let mut elevator = Self {
            current_floor: 1,
            floors: config.floors.max(1),
            y: 0.0,
            moving: false,
            floor_height: config.elevator_floor_height,
            speed: config.elevator_speed,
        };
        elevator.y = elevator.floor_y(1);
        elevator
    }

    pub fn floor_y(&self, floor: u32) -> f32 {
        self.floors.saturating_sub(floor) as f32 * self.floor_height
    }

    /// One floor up. Ignored while travelling or on the top floor.
    pub fn move_up(&mut self) -> bool {
        if self.moving || self.current_floor >= self.floors {
            return false;
        }
        self.current_floor += 1;
        self.moving = true;
        true
    }

    /// One floor down. Ignored while travelling or on the ground floor.
    pub fn move_down(&mut self) -> bool {
        if self.moving || self.current_floor <= 1 {
            return false;
        }
        self.current_floor -= 1;
        self.moving = true;
        true
    }

    /// Advances the cab toward the current floor. Returns true on the arrival tick.
    pub fn tick(&mut self) -> bool {
        if !self.moving {
            return false;
        }
        let target = self.floor_y(self.current_floor);
        let remaining = target - self.y;
        if remaining.abs() <= self.speed {
            self.y = target;
            self.moving = false;
            return true;
        }
        self.y += self.speed * remaining.signum();
        false
    }

    /// Room behind the given side of the cab on the current floor.
    pub fn room_for_exit(&self, side: Direction) -> Option<u32> {
        match side {
            Direction::Left => Some(self.current_floor * 2 - 1),
            Direction::Right => Some(self.current_floor * 2),
            Direction::Up | Direction::Down => None,
        }
    }

    pub fn floor_for_room(room: u32) -> u32 {
        room.div_ceil(2).max(1)
    }

    /// Parks the cab at `floor` without travelling.
    pub fn arrive_at_floor(&mut self, floor: u32) {
        self.current_floor = floor.clamp(1, self.floors);
        self.y = self.floor_y(self.current_floor);
        self.moving = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_floor_per_press_and_ignored_while_moving() {
        let config = GameConfig::default();
        let mut elevator = Elevator::new(&config);
        assert!(!elevator.move_down());
        assert!(elevator.move_up());
        assert!(!elevator.move_up());
        assert_eq!(elevator.current_floor, 2);

        let mut ticks = 0;
        while !elevator.tick() {
            ticks += 1;
            assert!(ticks < 1000);
        }
        assert!(!elevator.moving);
        assert_eq!(elevator.y, elevator.floor_y(2));
        assert!(elevator.floor_y(2) < elevator.floor_y(1));
    }

    #[test]
    fn top_floor_is_a_bound() {
        let config = GameConfig::default();
        let mut elevator = Elevator::new(&config);
        elevator.arrive_at_floor(config.floors);
        assert!(!elevator.move_up());
        assert!(elevator.move_down());
    }

    #[test]
    fn exits_map_to_rooms() {
        let config = GameConfig::default();
        let mut elevator = Elevator::new(&config);
        elevator.arrive_at_floor(3);
        assert_eq!(elevator.room_for_exit(Direction::Left), Some(5));
        assert_eq!(elevator.room_for_exit(Direction::Right), Some(6));
        assert_eq!(elevator.room_for_exit(Direction::Up), None);
        assert_eq!(Elevator::floor_for_room(5), 3);
        assert_eq!(Elevator::floor_for_room(6), 3);
    }
}
