//! The object record the database stores: a name plus measured properties
//! and their validity masks.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::fco::name::FcoName;
use crate::fco::prop::{Prop, PropValue, PROP_COUNT};
use crate::fco::prop_vector::PropVector;

/// A File Configuration Object.
///
/// A property is readable iff its bit is in `valid`; a valid property whose
/// bit is also in `undefined` reads as [`PropValue::Undefined`], meaning the
/// property was requested but could not be computed. `valid ⊇ undefined`
/// always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Fco {
    name: FcoName,
    props: Vec<PropValue>,
    valid: PropVector,
    undefined: PropVector,
}

impl Fco {
    pub fn new(name: FcoName) -> Self {
        Self {
            name,
            props: vec![PropValue::Undefined; PROP_COUNT],
            valid: PropVector::new(),
            undefined: PropVector::new(),
        }
    }

    pub fn name(&self) -> &FcoName {
        &self.name
    }

    pub fn set_name(&mut self, name: FcoName) {
        self.name = name;
    }

    pub fn valid_mask(&self) -> &PropVector {
        &self.valid
    }

    pub fn undefined_mask(&self) -> &PropVector {
        &self.undefined
    }

    /// Reads a property.
    ///
    /// Returns the value when valid and defined, the `Undefined` sentinel
    /// when valid but uncomputable, and an error when the property was
    /// never requested for this object.
    pub fn get(&self, prop: Prop) -> Result<&PropValue> {
        if !self.valid.contains(prop) {
            return Err(Error::WireFormat("property was not requested for this object"));
        }
        if self.undefined.contains(prop) {
            return Ok(&PropValue::Undefined);
        }
        Ok(&self.props[prop.index()])
    }

    /// Stores a property value, marking it valid and defined.
    pub fn set(&mut self, prop: Prop, value: PropValue) {
        self.props[prop.index()] = value;
        self.valid.add(prop);
        self.undefined.remove(prop);
    }

    /// Marks a property as requested but uncomputable.
    pub fn mark_undefined(&mut self, prop: Prop) {
        self.props[prop.index()] = PropValue::Undefined;
        self.valid.add(prop);
        self.undefined.add(prop);
    }

    /// Copies from `src` every property position in `mask` that is valid in
    /// `src`, propagating undefined-ness. Positions outside `src`'s valid
    /// mask are left untouched.
    pub fn copy_props(&mut self, src: &Fco, mask: &PropVector) {
        for prop in mask.props() {
            if !src.valid.contains(prop) {
                continue;
            }
            if src.undefined.contains(prop) {
                self.mark_undefined(prop);
            } else {
                self.set(prop, src.props[prop.index()].clone());
            }
        }
    }

    /// Drops properties outside `mask` entirely.
    pub fn invalidate_outside(&mut self, mask: &PropVector) {
        for idx in 0..PROP_COUNT {
            if !mask.contains_index(idx) && self.valid.contains_index(idx) {
                self.props[idx] = PropValue::Undefined;
                self.valid.remove_index(idx);
                self.undefined.remove_index(idx);
            }
        }
    }

    pub fn write(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        self.name.write(dest)?;
        self.valid.write(dest)?;
        self.undefined.write(dest)?;
        for prop in self.valid.props() {
            if !self.undefined.contains(prop) {
                self.props[prop.index()].write(dest)?;
            }
        }
        Ok(())
    }

    pub fn read(src: &mut impl Read) -> Result<Fco> {
        let name = FcoName::read(src)?;
        let valid = PropVector::read(src)?;
        let undefined = PropVector::read(src)?;
        if !valid.is_superset_of(&undefined) {
            return Err(Error::WireFormat("undefined mask escapes the valid mask"));
        }
        let mut fco = Fco::new(name);
        for idx in valid.iter() {
            let prop = Prop::from_index(idx)
                .ok_or(Error::WireFormat("object stores an unknown property"))?;
            if undefined.contains(prop) {
                fco.mark_undefined(prop);
            } else {
                fco.set(prop, PropValue::read(src)?);
            }
        }
        Ok(fco)
    }
}
