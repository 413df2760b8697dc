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

use super::NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Identifies a port by `(owner, direction, index)` (`spec.md` §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub node: NodeIndex,
    pub direction: PortDirection,
    pub index: usize,
}

impl Port {
    pub fn input(node: NodeIndex, index: usize) -> Self {
        Port {
            node,
            direction: PortDirection::Input,
            index,
        }
    }

    pub fn output(node: NodeIndex, index: usize) -> Self {
        Port {
            node,
            direction: PortDirection::Output,
            index,
        }
    }
}
