/*
 * Copyright (C) 2024 The HPSC-TRCH authors
 *
 * This file is part of HPSC-TRCH (firmware core of the HPSC chiplet's trusted control processor).
 *
 * HPSC-TRCH is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License version 2 as
 * published by the Free Software Foundation.
 *
 * HPSC-TRCH is distributed in the hope that it will be useful, but
 * WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
 * General Public License version 2 for more details.
 */

//! Contains fixed-capacity collections
//!
//! Nothing on the TRCH allocates memory dynamically. All queues and object pools are backed by
//! arrays whose capacity is fixed at compile time.

mod pool;
mod ringbuf;

pub use self::pool::{Pool, PoolId};
pub use self::ringbuf::RingBuf;
