mod cli;

use stacksmith::emit::Artifact;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("STACKSMITH_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Synth(synth_cli) => synth(synth_cli),
        cli::Command::Order(order_cli) => order(order_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn synth(cli: cli::SynthCommand) -> anyhow::Result<()> {
    let documents = load(&cli.input)?;
    let composition = stacksmith::compose::compose(&documents)?;
    let artifact = composition.synthesize()?;

    output(&cli.output, &artifact)?;
    Ok(())
}

pub fn order(cli: cli::OrderCommand) -> anyhow::Result<()> {
    let documents = load(&cli.input)?;
    let composition = stacksmith::compose::compose(&documents)?;

    composition.validate()?;
    for id in stacksmith::schedule::schedule(&composition)? {
        println!("{id}");
    }
    Ok(())
}

fn load(input: &cli::InputArgs) -> anyhow::Result<stacksmith::manifest::ManifestDocuments> {
    if !input.workdir && input.files.is_empty() && input.directories.is_empty() {
        let stdin = std::io::read_to_string(std::io::stdin())?;
        let body = hcl_edit::parser::parse_body(&stdin)?;
        return Ok(body.into());
    }

    let mut documents = stacksmith::manifest::ManifestDocuments::default();

    if input.workdir {
        documents.load_directory(&std::env::current_dir()?)?;
    }

    for file_path in &input.files {
        documents.load_file(file_path)?;
    }

    for dir_path in &input.directories {
        documents.load_directory(dir_path)?;
    }

    anyhow::ensure!(documents.source_count() > 0, "No manifests loaded");

    Ok(documents)
}

fn output(output: &cli::OutputArgs, artifact: &Artifact) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), artifact)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), artifact)?,
    };

    Ok(())
}

/// (stacksmith-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    let mut documents = stacksmith::manifest::ManifestDocuments::default();
    documents.load_directory(&std::env::current_dir()?)?;

    let composition = stacksmith::compose::compose(&documents)?;

    match cli.command {
        Documents => println!("{documents:#?}"),
        Composition => println!("{composition:#?}"),
    }

    Ok(())
}
