use plantbench_hardware::SimPlant;
use plantbench_traits::{PlantId, PlantIo, VCC};
use rstest::rstest;

#[rstest]
#[case(0, 0.0)]
#[case(128, 128.0 / 255.0 * VCC)]
#[case(255, VCC)]
fn duty_maps_linearly_onto_the_supply_rail(#[case] duty: u8, #[case] volts: f64) {
    let mut plant = SimPlant::new();
    plant.write_control(PlantId::Plant1, duty).expect("write");
    assert!((plant.drive_volts(PlantId::Plant1) - volts).abs() < 1e-9);
}

#[test]
fn step_response_decays_exponentially() {
    let mut plant = SimPlant::with_alpha(0.5);
    plant.write_control(PlantId::Plant2, 255).expect("write");

    let v1 = plant.read_voltage(PlantId::Plant2).expect("read");
    let v2 = plant.read_voltage(PlantId::Plant2).expect("read");
    assert!((v1 - VCC / 2.0).abs() < 1e-9);
    assert!((v2 - 0.75 * VCC).abs() < 1e-9);
}

#[test]
fn probe_clone_observes_without_advancing() {
    let mut plant = SimPlant::new();
    let probe = plant.clone();
    plant.write_control(PlantId::Plant1, 100).expect("write");

    let before = probe.output_volts(PlantId::Plant1);
    let after = probe.output_volts(PlantId::Plant1);
    assert_eq!(before, after, "probing must not step the simulation");

    let sampled = plant.read_voltage(PlantId::Plant1).expect("read");
    assert!(sampled > before, "reading does step the simulation");
}
