// The indices a grammar hands out are all, underneath, integers of the user-chosen StorageT.
// Newtyping them means the compiler catches rule/production/token index mix-ups for free.

use std::mem::size_of;

use num_traits::{self, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! IdxNewtype {
    ($(#[$attr:meta])* $n: ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $n<T>(pub T);

        impl<T: PrimInt + Unsigned> From<$n<T>> for usize {
            fn from(x: $n<T>) -> Self {
                debug_assert!(size_of::<usize>() >= size_of::<T>());
                num_traits::cast(x.0).unwrap()
            }
        }

        impl<T: PrimInt + Unsigned> From<$n<T>> for u32 {
            fn from(x: $n<T>) -> Self {
                debug_assert!(size_of::<u32>() >= size_of::<T>());
                num_traits::cast(x.0).unwrap()
            }
        }

        impl<T: PrimInt + Unsigned> $n<T> {
            pub fn as_storaget(&self) -> T {
                self.0
            }
        }
    }
}

IdxNewtype!(
    /// A type specifically for rule indices.
    ///
    /// `RIdx` converts to `usize` without loss of precision; every `Grammar`
    /// guarantees at construction time that its `StorageT` fits in `usize`.
    RIdx
);
IdxNewtype!(
    /// A type specifically for production indices (e.g. a rule `E: A | B;`
    /// has two productions for the single rule `E`).
    PIdx
);
IdxNewtype!(
    /// A type specifically for symbol positions within a production body.
    SIdx
);
IdxNewtype!(
    /// A type specifically for token indices.
    TIdx
);
