//! Short-lived on-screen text (countdown, server messages).
//!
//! A fixed pool of slots is reused; when every slot is busy the oldest
//! announcement is replaced.

pub const POOL_SIZE: usize = 8;
pub const DEFAULT_LIFETIME: f32 = 1.0;

#[derive(Debug, Clone, Default)]
pub struct Announcement {
    pub text: String,
    age: f32,
    lifetime: f32,
    active: bool,
}

impl Announcement {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// 1.0 when spawned, fading linearly to 0.0 at the end of its lifetime.
    pub fn alpha(&self) -> f32 {
        if self.lifetime <= 0.0 {
            return 0.0;
        }
        (1.0 - self.age / self.lifetime).clamp(0.0, 1.0)
    }

    /// Grows slightly as it fades.
    pub fn scale(&self) -> f32 {
        1.0 + 0.5 * (1.0 - self.alpha())
    }
}

#[derive(Debug, Clone)]
pub struct AnnouncementPool {
    slots: [Announcement; POOL_SIZE],
}

impl AnnouncementPool {
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
        }
    }

    pub fn spawn(&mut self, text: impl Into<String>, lifetime: f32) {
        let index = self
            .slots
            .iter()
            .position(|slot| !slot.active)
            .or_else(|| {
                self.slots
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.age.total_cmp(&b.age))
                    .map(|(index, _)| index)
            })
            .unwrap_or(0);

        self.slots[index] = Announcement {
            text: text.into(),
            age: 0.0,
            lifetime,
            active: true,
        };
    }

    /// Ages every announcement and retires the expired ones.
    pub fn animate(&mut self, dt: f32) {
        for slot in self.slots.iter_mut().filter(|slot| slot.is_active()) {
            slot.age += dt;
            if slot.age >= slot.lifetime {
                slot.active = false;
            }
        }
    }

    pub fn active(&self) -> impl Iterator<Item = &Announcement> {
        self.slots.iter().filter(|slot| slot.is_active())
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.active = false;
        }
    }
}

impl Default for AnnouncementPool {
    fn default() -> Self {
        Self::new()
    }
}
