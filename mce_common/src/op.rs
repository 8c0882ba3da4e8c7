//! Operator boilerplate for transparent numeric newtypes.

#[macro_export]
macro_rules! op {
    (binary $t:ty, $trait:ident, $method:ident) => {
        impl $trait for $t {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self(self.0.$method(rhs.0))
            }
        }
    };
    (inplace $t:ty, $trait:ident, $method:ident) => {
        impl $trait for $t {
            fn $method(&mut self, rhs: Self) {
                self.0.$method(rhs.0);
            }
        }
    };
    (unary $t:ty, $trait:ident, $method:ident) => {
        impl $trait for $t {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self(self.0.$method())
            }
        }
    };
}
