use std::mem;

/// Lifecycle of a presentation surface. The swapchain only exists in [`SurfaceState::Ready`] and
/// [`SurfaceState::Stale`], so it can't be used before init or after destruction.
#[derive(Debug)]
pub enum SurfaceState<S> {
	Uninitialized,
	Ready(S),
	/// The swapchain no longer matches the window and must be recreated before the next acquire.
	Stale(S),
	Destroyed,
}

impl<S> Default for SurfaceState<S> {
	fn default() -> Self {
		SurfaceState::Uninitialized
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SurfaceStatus {
	Uninitialized,
	Ready,
	Stale,
	Destroyed,
}

impl<S> SurfaceState<S> {
	pub fn status(&self) -> SurfaceStatus {
		match self {
			SurfaceState::Uninitialized => SurfaceStatus::Uninitialized,
			SurfaceState::Ready(_) => SurfaceStatus::Ready,
			SurfaceState::Stale(_) => SurfaceStatus::Stale,
			SurfaceState::Destroyed => SurfaceStatus::Destroyed,
		}
	}

	/// The swapchain, whether it is still usable or not
	pub fn swapchain(&self) -> Option<&S> {
		match self {
			SurfaceState::Ready(s) | SurfaceState::Stale(s) => Some(s),
			SurfaceState::Uninitialized | SurfaceState::Destroyed => None,
		}
	}

	/// The swapchain, only if it may be acquired from
	pub fn ready(&self) -> Option<&S> {
		match self {
			SurfaceState::Ready(s) => Some(s),
			_ => None,
		}
	}

	/// `Ready -> Stale`, returns true if the state changed.
	pub fn mark_stale(&mut self) -> bool {
		match mem::take(self) {
			SurfaceState::Ready(s) => {
				*self = SurfaceState::Stale(s);
				true
			}
			other => {
				*self = other;
				false
			}
		}
	}

	/// Takes the swapchain out of `Ready` or `Stale`, leaving `Uninitialized` behind until [`Self::set_ready`].
	pub fn take_swapchain(&mut self) -> Option<S> {
		match mem::take(self) {
			SurfaceState::Ready(s) | SurfaceState::Stale(s) => Some(s),
			other => {
				*self = other;
				None
			}
		}
	}

	pub fn set_ready(&mut self, swapchain: S) {
		debug_assert!(!matches!(self, SurfaceState::Destroyed), "destroyed surfaces can not become ready");
		*self = SurfaceState::Ready(swapchain);
	}

	/// Moves into `Destroyed`, returning the swapchain if there was one.
	pub fn destroy(&mut self) -> Option<S> {
		match mem::replace(self, SurfaceState::Destroyed) {
			SurfaceState::Ready(s) | SurfaceState::Stale(s) => Some(s),
			SurfaceState::Uninitialized | SurfaceState::Destroyed => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_transitions() {
		let mut state = SurfaceState::<u32>::default();
		assert_eq!(state.status(), SurfaceStatus::Uninitialized);
		assert!(!state.mark_stale());
		assert_eq!(state.status(), SurfaceStatus::Uninitialized);

		state.set_ready(1);
		assert_eq!(state.ready(), Some(&1));
		assert!(state.mark_stale());
		assert!(!state.mark_stale());
		assert_eq!(state.status(), SurfaceStatus::Stale);
		assert_eq!(state.ready(), None);
		assert_eq!(state.swapchain(), Some(&1));

		assert_eq!(state.take_swapchain(), Some(1));
		state.set_ready(2);
		assert_eq!(state.status(), SurfaceStatus::Ready);

		assert_eq!(state.destroy(), Some(2));
		assert_eq!(state.status(), SurfaceStatus::Destroyed);
		assert!(state.take_swapchain().is_none());
		assert_eq!(state.status(), SurfaceStatus::Destroyed);
	}
}
