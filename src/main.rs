use std::env;

use cim_sim::main_inner;
use eyre::Result;

fn main() -> Result<()> {
    main_inner(env::args())
}
