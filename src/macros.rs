pub use enclose::*;

/// Build a derived [`Value`](crate::Value) from an optional capture list, an
/// input list and a body returning [`Recompute`](crate::Recompute).
#[macro_export]
macro_rules! computed {
	(( $($d_tt:tt)* ) [ $($input:expr),* $(,)? ] => $($b:tt)*) => {
		$crate::Value::computed(
			&[$( &$input as &dyn $crate::Reactive ),*],
			$crate::macros::enclose!(($( $d_tt )*) move || { $($b)* }),
		)
	};
	([ $($input:expr),* $(,)? ] => $($b:tt)*) => {
		$crate::Value::computed(
			&[$( &$input as &dyn $crate::Reactive ),*],
			move || { $($b)* },
		)
	};
}
