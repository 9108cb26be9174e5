//! Request priority levels.

/// Priority of a request, from 1 to 3.
///
/// Level 3 is a transient override: it always gets through, but it is
/// recorded on the device as level 1, so a later level-2 request can still
/// take over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority {
    pub(crate) value: u8,
}

impl Default for Priority {
    fn default() -> Self {
        Self::new()
    }
}

impl Priority {
    const MIN: u8 = 1;
    const MAX: u8 = 3;
    const TRANSIENT: u8 = 3;

    /// The default level (1).
    pub fn new() -> Self {
        Priority { value: Self::MIN }
    }

    /// The transient override level (3).
    pub fn transient() -> Self {
        Priority {
            value: Self::TRANSIENT,
        }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn is_transient(&self) -> bool {
        self.value == Self::TRANSIENT
    }

    /// The level a device remembers after applying a request of this priority.
    ///
    /// # Examples
    ///
    /// ```
    /// use play_lights::Priority;
    ///
    /// assert_eq!(Priority::create(2).unwrap().recorded(), 2);
    /// assert_eq!(Priority::transient().recorded(), 1);
    /// ```
    pub fn recorded(&self) -> u8 {
        if self.is_transient() {
            Self::MIN
        } else {
            self.value
        }
    }

    /// Returns None if value is outside valid range (1-3).
    ///
    /// # Examples
    ///
    /// ```
    /// use play_lights::Priority;
    ///
    /// assert!(Priority::create(0).is_none());
    /// assert!(Priority::create(1).is_some());
    /// assert!(Priority::create(3).is_some());
    /// assert!(Priority::create(4).is_none());
    /// ```
    pub fn create(value: i64) -> Option<Self> {
        u8::try_from(value)
            .ok()
            .filter(|v| Self::is_valid(*v))
            .map(|value| Priority { value })
    }

    fn is_valid(value: u8) -> bool {
        (Self::MIN..=Self::MAX).contains(&value)
    }
}
