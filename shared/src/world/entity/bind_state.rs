use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindState {
    NotBound,
    PreBound,
    Bound,
}

impl fmt::Display for BindState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindState::NotBound => "NotBound",
            BindState::PreBound => "PreBound",
            BindState::Bound => "Bound",
        };
        f.write_str(name)
    }
}
