//! Clock tree frequency resolution.
//!
//! A chip family describes its clock tree as a static table: every clock is either a
//! primitive (an oscillator or an arithmetic node such as a PLL output, evaluated by
//! [`ClockTree::primitive`]) or a multiplexer that selects one of its upstream sources with a
//! register field. Resolution reads the live register state and never caches anything.
//!
//! The table must be acyclic. This is not checked while resolving; every table is checked by
//! [`find_cycle`] in its tests instead.

/// Read access to a block of 32-bit configuration registers.
pub trait RegisterFile {
    /// Read the register at byte `offset` from the start of the block.
    fn read(&self, offset: usize) -> u32;
}

impl<R: RegisterFile + ?Sized> RegisterFile for &R {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }
}

/// Location of a register inside a [`RegisterFile`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reg(usize);

impl Reg {
    /// Register at byte `offset`.
    pub const fn at(offset: usize) -> Self {
        Self(offset)
    }

    /// Field of `width` bits starting at bit `shift`.
    pub const fn field(self, shift: u32, width: u32) -> Field {
        Field {
            offset: self.0,
            shift,
            mask: (1 << width) - 1,
        }
    }

    /// Single bit field.
    pub const fn bit(self, shift: u32) -> Field {
        self.field(shift, 1)
    }
}

/// Bit field of a register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    offset: usize,
    shift: u32,
    mask: u32,
}

impl Field {
    /// Read the field value, shifted down to bit 0.
    pub fn get<R: RegisterFile + ?Sized>(self, regs: &R) -> u32 {
        (regs.read(self.offset) >> self.shift) & self.mask
    }

    /// Check whether any bit of the field is set.
    pub fn is_set<R: RegisterFile + ?Sized>(self, regs: &R) -> bool {
        self.get(regs) != 0
    }
}

/// Multiplexer selecting one of several upstream clocks.
#[derive(Debug)]
pub struct Mux<C: 'static> {
    select: Option<Field>,
    sources: &'static [Option<C>],
}

impl<C: 'static> Mux<C> {
    /// Multiplexer controlled by `select`. A `None` slot means the selector value has no
    /// source connected.
    pub const fn new(select: Field, sources: &'static [Option<C>]) -> Self {
        Self {
            select: Some(select),
            sources,
        }
    }

    /// Clock that always follows the first source.
    pub const fn fixed(sources: &'static [Option<C>]) -> Self {
        Self {
            select: None,
            sources,
        }
    }
}

/// Kind of a clock in the tree.
#[derive(Debug)]
pub enum Node<C: 'static> {
    /// Evaluated by [`ClockTree::primitive`]. `inputs` lists the clocks the formula reads.
    Primitive { inputs: &'static [C] },
    /// Follows the source picked by the multiplexer.
    Derived(&'static Mux<C>),
}

/// Clock identifiers with stable names.
pub trait ClockName: Copy + Eq + 'static {
    /// Every clock of the family.
    const ALL: &'static [Self];

    /// Public name of the clock.
    fn name(self) -> &'static str;

    /// Look up a clock by its public name.
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|clock| clock.name() == name)
    }
}

/// Clock tree of a chip family.
pub trait ClockTree {
    /// Clock identifier.
    type Clock: ClockName;
    /// Registers the tree reads.
    type Registers: RegisterFile;

    /// Table entry for `clock`.
    fn node(clock: Self::Clock) -> Node<Self::Clock>;

    /// Registers holding the current configuration.
    fn registers(&self) -> &Self::Registers;

    /// Frequency of a [`Node::Primitive`] clock, or 0 if it is not running.
    fn primitive(&self, clock: Self::Clock) -> u32;

    /// Current frequency of `clock` in Hz, 0 if it is off or unready.
    fn frequency(&self, clock: Self::Clock) -> u32 {
        resolve(self, clock)
    }

    /// Current frequency of the clock called `name`, 0 if there is no such clock.
    fn frequency_by_name(&self, name: &str) -> u32 {
        Self::Clock::from_name(name).map_or(0, |clock| self.frequency(clock))
    }
}

/// Resolve the frequency of `clock` by walking the tree.
pub fn resolve<T: ClockTree + ?Sized>(tree: &T, clock: T::Clock) -> u32 {
    match T::node(clock) {
        Node::Primitive { .. } => tree.primitive(clock),
        Node::Derived(mux) => {
            let index = mux.select.map_or(0, |field| field.get(tree.registers()));

            match mux.sources.get(index as usize) {
                Some(Some(source)) => tree.frequency(*source),
                _ => 0,
            }
        }
    }
}

/// Find a clock from which a cycle in the table can be reached.
///
/// Returns `None` when the table is a DAG.
pub fn find_cycle<T: ClockTree + ?Sized>() -> Option<T::Clock> {
    let limit = T::Clock::ALL.len();
    T::Clock::ALL
        .iter()
        .copied()
        .find(|&clock| !settles::<T>(clock, limit))
}

/// Check that every path upstream of `clock` ends within `depth` nodes.
fn settles<T: ClockTree + ?Sized>(clock: T::Clock, depth: usize) -> bool {
    let Some(depth) = depth.checked_sub(1) else {
        return false;
    };

    match T::node(clock) {
        Node::Primitive { inputs } => inputs.iter().all(|&input| settles::<T>(input, depth)),
        Node::Derived(mux) => mux
            .sources
            .iter()
            .flatten()
            .all(|&source| settles::<T>(source, depth)),
    }
}

/// Declare a clock identifier enum and its names.
#[macro_export]
macro_rules! clock_names {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $text:literal,
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )*
        }

        impl $crate::clock::ClockName for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),*];

            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)*
                }
            }
        }
    };
}
