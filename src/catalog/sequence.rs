// Copyright 2026 The relplan_opt Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// `spec.md` §3.3: name, int64 attributes, constraints `min <= initial <= max` and
/// `increment != 0`.
#[derive(Debug)]
pub struct Sequence {
    pub name: String,
    pub initial: i64,
    pub increment: i64,
    pub min: i64,
    pub max: i64,
    pub cycle: bool,
    pub(crate) provider_owner: Mutex<Option<u64>>,
}

impl Sequence {
    pub fn new(
        name: impl Into<String>,
        initial: i64,
        increment: i64,
        min: i64,
        max: i64,
        cycle: bool,
    ) -> Result<Self> {
        if increment == 0 {
            return Err(Error::argument("sequence increment must be non-zero"));
        }
        if !(min <= initial && initial <= max) {
            return Err(Error::argument(
                "sequence requires min <= initial <= max",
            ));
        }
        Ok(Sequence {
            name: name.into(),
            initial,
            increment,
            min,
            max,
            cycle,
            provider_owner: Mutex::new(None),
        })
    }
}
