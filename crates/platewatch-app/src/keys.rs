// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

/// Terminal-independent key, as far as the modal shortcuts care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Left,
    Right,
    Up,
    Down,
    Tab,
    Enter,
    Esc,
    Backspace,
    Char(char),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutCommand {
    PreviousVideo,
    NextVideo,
    TogglePlayback,
    RefreshLookup,
    Save,
    Delete,
    Close,
    BlurInput,
    FocusField,
    FieldUp,
    FieldDown,
}

/// Maps a key to the frontmost modal's command. While a text field has focus
/// only blur keys are handled; everything else is left to the field.
pub fn dispatch(key: Key, input_focused: bool) -> Option<ShortcutCommand> {
    if input_focused {
        return match key {
            Key::Esc | Key::Enter => Some(ShortcutCommand::BlurInput),
            _ => None,
        };
    }
    match key {
        Key::Esc => Some(ShortcutCommand::Close),
        Key::Space => Some(ShortcutCommand::TogglePlayback),
        Key::Left => Some(ShortcutCommand::PreviousVideo),
        Key::Right => Some(ShortcutCommand::NextVideo),
        Key::Up => Some(ShortcutCommand::FieldUp),
        Key::Down | Key::Tab => Some(ShortcutCommand::FieldDown),
        Key::Enter => Some(ShortcutCommand::FocusField),
        Key::Char(ch) => match ch.to_ascii_lowercase() {
            'r' => Some(ShortcutCommand::RefreshLookup),
            's' => Some(ShortcutCommand::Save),
            'd' => Some(ShortcutCommand::Delete),
            ' ' => Some(ShortcutCommand::TogglePlayback),
            _ => None,
        },
        Key::Backspace | Key::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Key, ShortcutCommand, dispatch};

    #[test]
    fn letters_are_case_insensitive() {
        for (lower, upper, command) in [
            ('r', 'R', ShortcutCommand::RefreshLookup),
            ('s', 'S', ShortcutCommand::Save),
            ('d', 'D', ShortcutCommand::Delete),
        ] {
            assert_eq!(dispatch(Key::Char(lower), false), Some(command));
            assert_eq!(dispatch(Key::Char(upper), false), Some(command));
        }
    }

    #[test]
    fn escape_blurs_focused_input_instead_of_closing() {
        assert_eq!(
            dispatch(Key::Esc, true),
            Some(ShortcutCommand::BlurInput)
        );
        assert_eq!(dispatch(Key::Esc, false), Some(ShortcutCommand::Close));
    }

    #[test]
    fn shortcuts_are_suppressed_while_typing() {
        for key in [
            Key::Space,
            Key::Left,
            Key::Right,
            Key::Up,
            Key::Tab,
            Key::Char('s'),
            Key::Char('d'),
            Key::Char('r'),
            Key::Backspace,
        ] {
            assert_eq!(dispatch(key, true), None, "{key:?} leaked through");
        }
    }

    #[test]
    fn navigation_and_playback_keys() {
        assert_eq!(
            dispatch(Key::Left, false),
            Some(ShortcutCommand::PreviousVideo)
        );
        assert_eq!(dispatch(Key::Right, false), Some(ShortcutCommand::NextVideo));
        assert_eq!(
            dispatch(Key::Space, false),
            Some(ShortcutCommand::TogglePlayback)
        );
        assert_eq!(dispatch(Key::Char('x'), false), None);
    }

    #[test]
    fn enter_focuses_then_blurs() {
        assert_eq!(dispatch(Key::Enter, false), Some(ShortcutCommand::FocusField));
        assert_eq!(dispatch(Key::Enter, true), Some(ShortcutCommand::BlurInput));
    }
}
