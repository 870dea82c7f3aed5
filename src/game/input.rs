use super::types::Direction;

pub fn parse_direction(value: u8) -> Option<Direction> {
    match value {
        0 => Some(Direction::Up),
        1 => Some(Direction::Right),
        2 => Some(Direction::Down),
        3 => Some(Direction::Left),
        _ => None,
    }
}

// A turn always rotates 90 degrees: same-axis requests are rejected.
pub fn is_valid_turn(current: Direction, requested: Direction) -> bool {
    requested != current && requested != current.opposite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_four_directions() {
        assert_eq!(parse_direction(0), Some(Direction::Up));
        assert_eq!(parse_direction(1), Some(Direction::Right));
        assert_eq!(parse_direction(2), Some(Direction::Down));
        assert_eq!(parse_direction(3), Some(Direction::Left));
        assert_eq!(parse_direction(4), None);
        assert_eq!(parse_direction(255), None);
    }

    #[test]
    fn rejects_same_axis_turns() {
        assert!(!is_valid_turn(Direction::Right, Direction::Right));
        assert!(!is_valid_turn(Direction::Right, Direction::Left));
        assert!(is_valid_turn(Direction::Right, Direction::Up));
        assert!(is_valid_turn(Direction::Right, Direction::Down));
        assert!(!is_valid_turn(Direction::Up, Direction::Down));
        assert!(is_valid_turn(Direction::Up, Direction::Left));
    }
}
