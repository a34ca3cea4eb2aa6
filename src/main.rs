use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::exit;
use std::sync::atomic::Ordering;

use symir::diagnostics::{self, DiagBag, Level, ERRORS_AS_JSON};
use symir::interp::{Interpreter, SymBinding};
use symir::passes::PassResult;
use symir::symbolic::{Config, Executor, ModelValue, Status};
use symir::{emitter, emitter_wat, pp};

fn usage() {
    eprintln!("usage: symir <command> [options] <input.sir>");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  check    run the analysis pipeline and report diagnostics");
    eprintln!("  run      interpret a function with all symbols bound");
    eprintln!("  solve    find symbol values making a block path feasible");
    eprintln!("  emit     lower to C or WebAssembly text");
    eprintln!();
    eprintln!("options:");
    eprintln!("  --fun @name          function to run or solve (default @main)");
    eprintln!("  --path ^a,^b,...     block path for solve");
    eprintln!("  --sym name=value     bind or fix a symbol (repeatable)");
    eprintln!("  --target c|wat       emit target (default c)");
    eprintln!("  -o, --output FILE    output file (default stdout)");
    eprintln!("  --emit-model FILE    write the SAT model as JSON");
    eprintln!("  --timeout-ms N       solver timeout");
    eprintln!("  --seed N             solver seed");
    eprintln!("  --tee FILE           tee the solver session to FILE");
    eprintln!("  --dump-ast           print the parsed tree and exit");
    eprintln!("  --no-module-tags     omit (module ...) in wat output");
    eprintln!("  -w                   inhibit warnings");
    eprintln!("  --Werror             treat warnings as errors");
    eprintln!("  --json               line-oriented JSON diagnostics");
}

struct Options {
    command:        String,
    input:          Option<String>,
    fun:            String,
    path:           Option<String>,
    syms:           Vec<String>,
    target:         String,
    output:         Option<String>,
    emit_model:     Option<String>,
    timeout_ms:     u32,
    seed:           u32,
    tee:            Option<PathBuf>,
    dump_ast:       bool,
    no_module_tags: bool,
    no_warn:        bool,
    werror:         bool,
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args[0] == "-h" || args[0] == "--help" {
        usage();
        exit(if args.is_empty() { 2 } else { 0 });
    }

    let mut opts = Options {
        command:        args[0].clone(),
        input:          None,
        fun:            "@main".to_string(),
        path:           None,
        syms:           Vec::new(),
        target:         "c".to_string(),
        output:         None,
        emit_model:     None,
        timeout_ms:     symir::smt::TIMEOUT.load(Ordering::Relaxed) as u32,
        seed:           0,
        tee:            None,
        dump_ast:       false,
        no_module_tags: false,
        no_warn:        false,
        werror:         false,
    };

    let mut i = 1;
    let need = |i: usize, args: &[String], what: &str| -> String {
        match args.get(i + 1) {
            Some(v) => v.clone(),
            None => {
                eprintln!("error: {} needs an argument", what);
                exit(2);
            }
        }
    };
    while i < args.len() {
        match args[i].as_str() {
            "--fun"             => {
                opts.fun = need(i, &args, "--fun");
                i += 1;
            }
            "--path"            => {
                opts.path = Some(need(i, &args, "--path"));
                i += 1;
            }
            "--sym"             => {
                opts.syms.push(need(i, &args, "--sym"));
                i += 1;
            }
            "--target"          => {
                opts.target = need(i, &args, "--target");
                i += 1;
            }
            "-o" | "--output"   => {
                opts.output = Some(need(i, &args, "--output"));
                i += 1;
            }
            "--emit-model"      => {
                opts.emit_model = Some(need(i, &args, "--emit-model"));
                i += 1;
            }
            "--timeout-ms"      => {
                opts.timeout_ms = need(i, &args, "--timeout-ms").parse().unwrap_or_else(|_| {
                    eprintln!("error: --timeout-ms needs a number");
                    exit(2);
                });
                i += 1;
            }
            "--seed"            => {
                opts.seed = need(i, &args, "--seed").parse().unwrap_or_else(|_| {
                    eprintln!("error: --seed needs a number");
                    exit(2);
                });
                i += 1;
            }
            "--tee"             => {
                opts.tee = Some(PathBuf::from(need(i, &args, "--tee")));
                i += 1;
            }
            "--dump-ast"        => opts.dump_ast = true,
            "--no-module-tags"  => opts.no_module_tags = true,
            "-w"                => opts.no_warn = true,
            "--Werror"          => opts.werror = true,
            "--json"            => ERRORS_AS_JSON.store(true, Ordering::SeqCst),
            "-h" | "--help"     => {
                usage();
                exit(0);
            }
            other => {
                if other.starts_with('-') {
                    eprintln!("error: unknown option {}", other);
                    exit(2);
                }
                if opts.input.is_some() {
                    eprintln!("error: multiple input files");
                    exit(2);
                }
                opts.input = Some(other.to_string());
            }
        }
        i += 1;
    }
    opts
}

fn parse_sym_bindings(pairs: &[String]) -> HashMap<String, SymBinding> {
    let mut out = HashMap::new();
    for s in pairs {
        let eq = match s.find('=') {
            Some(eq) => eq,
            None => {
                eprintln!("error: --sym expects name=value, got '{}'", s);
                exit(2);
            }
        };
        let (name, val) = (&s[..eq], &s[eq + 1..]);
        let binding = match symir::ast::parse_int_literal(val) {
            Some(i) => SymBinding::Int(i),
            None => match val.parse::<f64>() {
                Ok(f) => SymBinding::Float(f),
                Err(_) => {
                    eprintln!("error: cannot parse symbol value '{}'", val);
                    exit(2);
                }
            },
        };
        out.insert(name.to_string(), binding);
    }
    out
}

fn write_output(path: &Option<String>, content: &str) {
    match path {
        Some(p) => {
            if let Err(e) = std::fs::write(p, content) {
                eprintln!("error: cannot write {}: {}", p, e);
                exit(1);
            }
        }
        None => {
            print!("{}", content);
        }
    }
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::Builder::from_default_env()
        .format_timestamp(None)
        .format_module_path(false)
        .init();

    let opts = parse_args();

    let input = match &opts.input {
        Some(p) => p.clone(),
        None => {
            eprintln!("error: no input file");
            usage();
            exit(2);
        }
    };
    let src = match std::fs::read_to_string(&input) {
        Ok(src) => src,
        Err(e) => {
            eprintln!("error: cannot read {}: {}", input, e);
            exit(1);
        }
    };

    let stderr = std::io::stderr();

    let prog = match symir::parse_source(&src) {
        Ok(prog) => prog,
        Err(e) => {
            let span = e.details.first().map(|d| d.0).unwrap_or_default();
            let mut out = stderr.lock();
            diagnostics::print_message(&mut out, &src, &input, span, &e.message, Level::Error);
            exit(1);
        }
    };

    if opts.dump_ast {
        println!("{:#?}", prog);
        exit(0);
    }

    let mut diags = DiagBag::new();
    let result = symir::check_program(&prog, &mut diags);

    {
        let mut out = stderr.lock();
        for d in &diags.diags {
            match d.level {
                Level::Error => {
                    diagnostics::print_message(&mut out, &src, &input, d.span, &d.message, d.level)
                }
                Level::Warning if opts.werror || !opts.no_warn => {
                    let level = if opts.werror { Level::Error } else { Level::Warning };
                    diagnostics::print_message(&mut out, &src, &input, d.span, &d.message, level)
                }
                _ => {}
            }
        }
    }
    if result == PassResult::Error || (opts.werror && diags.has_warnings()) {
        exit(1);
    }

    match opts.command.as_str() {
        "check" => {}
        "run" => {
            let bindings = parse_sym_bindings(&opts.syms);
            let interp = Interpreter::new(&prog);
            match interp.run(&opts.fun, &bindings) {
                Ok(Some(v)) => println!("Result: {}", v),
                Ok(None) => println!("Result: void"),
                Err(e) => {
                    eprintln!("error: {}", e);
                    exit(1);
                }
            }
        }
        "solve" => {
            let path_str = match &opts.path {
                Some(p) => p.trim_matches(|c| c == '\'' || c == '"').to_string(),
                None => {
                    eprintln!("error: solve requires --path");
                    exit(2);
                }
            };
            let path: Vec<String> = path_str.split(',').map(|s| s.trim().to_string()).collect();

            let mut fixed = HashMap::new();
            for (name, b) in parse_sym_bindings(&opts.syms) {
                match b {
                    SymBinding::Int(i) => {
                        fixed.insert(name, i);
                    }
                    SymBinding::Float(_) => {
                        eprintln!("error: only integer symbol fixings are supported");
                        exit(2);
                    }
                }
            }

            let config = Config {
                timeout_ms: opts.timeout_ms,
                seed:       opts.seed,
                tee:        opts.tee.clone(),
            };
            let executor = Executor::new(&prog, config);
            let outcome = match executor.solve(&opts.fun, &path, &fixed) {
                Ok(outcome) => outcome,
                Err(e) => {
                    eprintln!("error: {}", e);
                    exit(1);
                }
            };

            match outcome.status {
                Status::Sat => {
                    println!("SAT");
                    let mut names: Vec<&String> = outcome.model.keys().collect();
                    names.sort();
                    for name in &names {
                        match outcome.model[*name] {
                            ModelValue::Int(i)      => println!("  {} = {}", name, i),
                            ModelValue::Float(f)    => println!("  {} = {}", name, f),
                        }
                    }

                    if let Some(model_path) = &opts.emit_model {
                        let mut inner = serde_json::Map::new();
                        for name in &names {
                            let v = match outcome.model[*name] {
                                ModelValue::Int(i)      => serde_json::Value::from(i),
                                ModelValue::Float(f)    => serde_json::Value::from(f),
                            };
                            inner.insert((*name).clone(), v);
                        }
                        let mut root = serde_json::Map::new();
                        root.insert(opts.fun.clone(), serde_json::Value::Object(inner));
                        let text = serde_json::to_string_pretty(&serde_json::Value::Object(root))
                            .unwrap();
                        if let Err(e) = std::fs::write(model_path, text) {
                            eprintln!("error: cannot write {}: {}", model_path, e);
                            exit(1);
                        }
                    }

                    if opts.output.is_some() {
                        let text = pp::print_program(&prog, Some(&outcome.model));
                        write_output(&opts.output, &text);
                    }
                }
                Status::Unsat => {
                    println!("UNSAT");
                    exit(1);
                }
                Status::Unknown => {
                    println!("UNKNOWN");
                    exit(1);
                }
            }
        }
        "emit" => {
            let text = match opts.target.as_str() {
                "c" => emitter::emit(&prog),
                "wat" => emitter_wat::emit_with_options(&prog, !opts.no_module_tags),
                other => {
                    eprintln!("error: unsupported target: {}", other);
                    exit(1);
                }
            };
            write_output(&opts.output, &text);
        }
        other => {
            eprintln!("error: unknown command: {}", other);
            usage();
            exit(2);
        }
    }

    let _ = std::io::stdout().flush();
}
