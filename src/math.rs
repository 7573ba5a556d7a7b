
//! Simple math utilities.

/// Simple two-dimensional vector of any numerical type.
/// Supports only few mathematical operations
/// as this is used mainly as data struct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Vec2<T>(pub T, pub T);

impl<T> Vec2<T> {

    /// The first component of this 2D vector.
    #[inline]
    pub fn x(self) -> T { self.0 }

    /// The second component of this 2D vector.
    #[inline]
    pub fn y(self) -> T { self.1 }

    /// The first component of this 2D vector.
    #[inline]
    pub fn width(self) -> T { self.0 }

    /// The second component of this 2D vector.
    #[inline]
    pub fn height(self) -> T { self.1 }

    /// Seeing this vector as a dimension or size (width and height),
    /// this returns the area that this dimensions contains (`width * height`).
    #[inline]
    pub fn area(self) -> T
        where T: std::ops::Mul<T, Output = T>
    {
        self.0 * self.1
    }
}
