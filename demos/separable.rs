use carnage_nn::{train_loop, Matrix, Network, TrainConfig};

fn main() -> carnage_nn::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let x = Matrix::from_rows(vec![
        vec![-1.0, -0.8],
        vec![-0.6, -1.2],
        vec![-1.4, -0.3],
        vec![0.9, 1.1],
        vec![1.3, 0.4],
        vec![0.5, 1.5],
    ])?;
    let y = Matrix::from_rows(vec![
        vec![1.0, 0.0],
        vec![1.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![0.0, 1.0],
        vec![0.0, 1.0],
    ])?;

    let mut network = Network::new(&[2, 4, 2], "relu", 0.1)?;
    let report = train_loop(&mut network, &x, &y, &TrainConfig::new(500).with_checkpoint_every(100))?;

    for c in &report.checkpoints {
        println!("Epoch {}: loss = {:.6}, accuracy = {:.2}", c.epoch, c.loss, c.accuracy);
    }

    let probabilities = network.probabilities(&x)?;
    for (input, p) in x.iter_rows().zip(probabilities.iter_rows()) {
        println!("Input: {:?} -> P = {:.4?}", input, p);
    }

    println!("{}", network.export().to_json()?);
    Ok(())
}
