use std::fmt;
use std::str::FromStr;

use crate::error::LoadError;

/// Тип блока без полей - общий словарь для редактора, кодека и интерпретатора
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Start,
    DisplayImage,
    PlayAnimation,
    Wait,
    Number,
    RandomRange,
    If,
    Compare,
    SetVariable,
    GetVariable,
    Forever,
    Repeat,
    While,
    Break,
    Gpio,
    IfGpio,
    GpioTrigger,
    SetColor,
    ColorValue,
    CustomColor,
    RgbColor,
}

impl BlockKind {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Start,
            Self::DisplayImage,
            Self::PlayAnimation,
            Self::Wait,
            Self::Number,
            Self::RandomRange,
            Self::If,
            Self::Compare,
            Self::SetVariable,
            Self::GetVariable,
            Self::Forever,
            Self::Repeat,
            Self::While,
            Self::Break,
            Self::Gpio,
            Self::IfGpio,
            Self::GpioTrigger,
            Self::SetColor,
            Self::ColorValue,
            Self::CustomColor,
            Self::RgbColor,
        ]
    }

    /// Wire name, the value of the `type` field
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::DisplayImage => "display_image",
            Self::PlayAnimation => "play_animation",
            Self::Wait => "wait",
            Self::Number => "number",
            Self::RandomRange => "random_range",
            Self::If => "if",
            Self::Compare => "compare",
            Self::SetVariable => "set_variable",
            Self::GetVariable => "get_variable",
            Self::Forever => "forever",
            Self::Repeat => "repeat",
            Self::While => "while",
            Self::Break => "break",
            Self::Gpio => "gpio",
            Self::IfGpio => "if_gpio",
            Self::GpioTrigger => "gpio_trigger",
            Self::SetColor => "set_color",
            Self::ColorValue => "color_value",
            Self::CustomColor => "custom_color",
            Self::RgbColor => "rgb_color",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Start => "Program entry point",
            Self::DisplayImage => "Show a raw image on the panel",
            Self::PlayAnimation => "Play an animation folder for a duration",
            Self::Wait => "Pause for a number of milliseconds",
            Self::Number => "Integer literal",
            Self::RandomRange => "Random integer between two bounds",
            Self::If => "Branch on a condition",
            Self::Compare => "Compare two numbers",
            Self::SetVariable => "Store a value in a variable",
            Self::GetVariable => "Read a variable",
            Self::Forever => "Loop until stopped",
            Self::Repeat => "Loop a fixed number of times",
            Self::While => "Loop while a condition holds",
            Self::Break => "Break out of loop (reserved)",
            Self::Gpio => "Drive a GPIO pin high or low",
            Self::IfGpio => "Branch on a GPIO pin state",
            Self::GpioTrigger => "Actions for a GPIO edge or level",
            Self::SetColor => "Set the drawing color",
            Self::ColorValue => "Predefined color",
            Self::CustomColor => "Hex color",
            Self::RgbColor => "Color from red, green and blue",
        }
    }

    /// Блоки-значения: имеют выход, но не имеют `next`
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            Self::Number
                | Self::RandomRange
                | Self::GetVariable
                | Self::Compare
                | Self::ColorValue
                | Self::CustomColor
                | Self::RgbColor
        )
    }

    /// Break has a previous connection only; start has neither
    pub fn has_next_connection(&self) -> bool {
        !self.is_expression() && !matches!(self, Self::Start | Self::Break)
    }

    pub fn has_previous_connection(&self) -> bool {
        !self.is_expression() && !matches!(self, Self::Start)
    }

    /// Literal fields the editor block carries
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Self::DisplayImage => &["FILENAME"],
            Self::PlayAnimation => &["FOLDER", "PLAY_FOR"],
            Self::Number => &["NUMBER"],
            Self::RandomRange => &["MIN", "MAX"],
            Self::Compare => &["OPERATOR"],
            Self::SetVariable | Self::GetVariable => &["VAR_NAME"],
            Self::Gpio | Self::IfGpio => &["PIN", "STATE"],
            Self::GpioTrigger => &["PIN", "TRIGGER"],
            Self::ColorValue | Self::CustomColor => &["COLOR"],
            Self::RgbColor => &["RED", "GREEN", "BLUE"],
            _ => &[],
        }
    }

    /// Statement inputs the editor block exposes
    pub fn statement_inputs(&self) -> &'static [&'static str] {
        match self {
            Self::If | Self::IfGpio => &["TRUE", "FALSE"],
            Self::Forever | Self::Repeat | Self::While | Self::GpioTrigger | Self::Start => &["DO"],
            _ => &[],
        }
    }

    /// Value inputs the editor block exposes
    pub fn value_inputs(&self) -> &'static [&'static str] {
        match self {
            Self::Wait => &["TIME"],
            Self::If | Self::While => &["CONDITION"],
            Self::Compare => &["LEFT", "RIGHT"],
            Self::SetVariable => &["VALUE"],
            Self::Repeat => &["TIMES"],
            Self::SetColor => &["COLOR"],
            _ => &[],
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BlockKind {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| LoadError::UnknownKind { kind: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for kind in BlockKind::all() {
            assert_eq!(kind.name().parse::<BlockKind>().unwrap(), kind);
        }
        assert_eq!(BlockKind::all().len(), 21);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "blink".parse::<BlockKind>().unwrap_err();
        assert!(matches!(err, LoadError::UnknownKind { kind } if kind == "blink"));
    }

    #[test]
    fn connections_follow_block_shapes() {
        assert!(!BlockKind::Start.has_previous_connection());
        assert!(!BlockKind::Start.has_next_connection());
        assert!(BlockKind::Break.has_previous_connection());
        assert!(!BlockKind::Break.has_next_connection());
        assert!(!BlockKind::Compare.has_next_connection());
        assert!(BlockKind::Wait.has_next_connection());
        assert_eq!(BlockKind::Repeat.value_inputs(), &["TIMES"]);
        assert_eq!(BlockKind::IfGpio.statement_inputs(), &["TRUE", "FALSE"]);
    }
}
