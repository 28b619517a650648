use formula_vm::Formula;
use log::debug;

fn main() {
    pretty_env_logger::init();

    let mut formula = Formula::new();

    let expr = "max(sqrt(x), 1 + 2) * -pi";
    formula.compile(expr).unwrap();
    debug!("postfix: {}", formula.postfix());

    formula.set_variable("x", 16.0);
    println!("{expr} with x = 16 -> {}", formula.evaluate().unwrap());

    // A custom function participates like any builtin once registered,
    // but registering forces a recompile.
    formula.register_fn2("hypot", f64::hypot);
    formula.compile("hypot(3, 4)").unwrap();
    println!("hypot(3, 4) -> {}", formula.evaluate().unwrap());
}
